use clap::{Parser, Subcommand};
use cli::commands::deploy::{DeployArgs, RunMode, handle_deploy};
use cli::commands::plans::handle_plans;
use cli::output::{print_error, print_summary, render_manifests};
use rollout_utils::setup_logging;

/// Rollout - deploys redis topologies onto a Kubernetes cluster
#[derive(Parser)]
#[command(name = "rollout")]
#[command(version)]
#[command(bin_name = "rollout")]
#[command(about = "Deploys redis topologies onto a Kubernetes cluster step by step")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate parameters and apply every step of a topology, waiting for each to become ready
    Deploy {
        #[command(flatten)]
        args: DeployArgs,
        /// Validate against the cluster but print the manifests instead of applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the resolved manifests of a topology without contacting the cluster
    Render {
        #[command(flatten)]
        args: DeployArgs,
    },
    /// List the available topologies and their steps
    Plans,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (args, mode) = match cli.command {
        Commands::Plans => return handle_plans(),
        Commands::Deploy { args, dry_run } => {
            let mode = if dry_run {
                RunMode::DryRun
            } else {
                RunMode::Apply
            };
            (args, mode)
        }
        Commands::Render { args } => (args, RunMode::Render),
    };

    let report = handle_deploy(&args, mode).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.dry_run {
        print!("{}", render_manifests(&report));
    } else {
        print_summary(&report);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging() {
        eprintln!("Failed to set up logging: {}", e);
    }
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("A rustls crypto provider was already installed");
    }

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

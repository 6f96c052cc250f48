use colored::*;
use prettytable::{Table, row};
use rollout_defs::DeploymentPlan;
use rollout_engine::RunReport;
use rollout_utils::indent;

/// Manifests of a dry run as one multi-document YAML stream.
pub fn render_manifests(report: &RunReport) -> String {
    let mut out = String::new();
    for step in &report.rendered {
        out.push_str("---\n");
        out.push_str(&format!("# Step {}: {}\n", step.ordinal, step.label));
        out.push_str(step.manifest.trim_end());
        out.push('\n');
    }
    out
}

pub fn print_summary(report: &RunReport) {
    println!(
        "{} {} deployed: {} steps in {}s",
        "✓".green(),
        report.plan.bold(),
        report.completed_steps,
        report.elapsed.as_secs()
    );
    if report.discovered.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_titles(row!["Key", "Resource", "Value"]);
    for value in &report.discovered {
        table.add_row(row![value.key, value.handle, value.value]);
    }
    table.printstd();
}

/// Describes where a failed run stopped. Resources of completed steps are
/// not removed, so the remaining steps are listed for manual follow-up.
pub fn failure_report(plan: &DeploymentPlan, completed: u32) -> String {
    let mut out = format!(
        "{} of {} steps of {} completed before the failure\n",
        completed,
        plan.len(),
        plan.name()
    );
    let pending: Vec<String> = plan
        .steps()
        .iter()
        .skip(completed as usize)
        .map(|step| format!("{}. {}", step.ordinal, step.label))
        .collect();
    if !pending.is_empty() {
        out.push_str("Not completed:\n");
        out.push_str(&indent(&pending.join("\n"), 2));
        out.push('\n');
    }
    out
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

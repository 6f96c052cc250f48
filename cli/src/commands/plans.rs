use colored::*;
use prettytable::{Table, row};
use rollout_defs::DeploymentPlan;
use rollout_engine::plans::{plan_for, topology_names};

fn plan_table(plan: &DeploymentPlan) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Step", "Label", "Template", "Waits for", "Discovers"]);
    for step in plan.steps() {
        let wait = step
            .wait
            .as_ref()
            .map(|w| format!("{} {} ({}s)", w.kind, w.name, w.timeout.as_secs()))
            .unwrap_or_else(|| "-".to_string());
        let discovers = if step.discover.is_empty() {
            "-".to_string()
        } else {
            step.discover
                .iter()
                .map(|d| d.key.as_str())
                .collect::<Vec<&str>>()
                .join(", ")
        };
        table.add_row(row![step.ordinal, step.label, step.template, wait, discovers]);
    }
    table
}

pub fn handle_plans() -> anyhow::Result<()> {
    for name in topology_names() {
        let plan = plan_for(name)?;
        println!("{}: {}", plan.name().bold(), plan.description());
        plan_table(&plan).printstd();
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_table_rows() {
        let plan = plan_for("redis-replication").unwrap();
        let table = plan_table(&plan);
        assert_eq!(table.len(), 4);
        let rendered = table.to_string();
        assert!(rendered.contains("Job redis-<suffix>-secret (300s)"));
        assert!(rendered.contains("redis_port_0, redis_port_1, redis_port_2"));
    }
}

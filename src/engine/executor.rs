//! Execution engine - applies planned changes group by group

use anyhow::Result;
use colored::Colorize;
use rgkit::{Change, Client, Plan};

use super::differ::{display_plan, error_chain};
use super::planner::ExecutionPlan;
use crate::{progress, ui};

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output (print statements)
    pub verbose: bool,
}

/// Summary of execution results
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub recreated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.recreated
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// What applying a plan does to its group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Unchanged,
    Created,
    Modified,
    Recreated,
}

fn outcome(plan: &Plan) -> Outcome {
    match plan.changes.as_slice() {
        [] => Outcome::Unchanged,
        [Change::CreateGroup(_)] => Outcome::Created,
        changes if changes.contains(&Change::DropGroup) => Outcome::Recreated,
        _ => Outcome::Modified,
    }
}

/// Display the plan, confirm, then apply each group sequentially.
///
/// A failing group is reported and the run continues with the next one.
pub fn execute(client: &mut Client, execution: &ExecutionPlan, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
    display_plan(execution, opts.verbose || opts.dry_run);

    let mut summary = ExecuteSummary {
        failed: execution.failures.len(),
        ..Default::default()
    };

    if execution.is_converged() {
        summary.unchanged = execution.groups.len();
        return Ok(summary);
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        summary.skipped = execution.pending().count();
        return Ok(summary);
    }

    if !opts.yes && !ui::confirm("Continue?", true)? {
        println!();
        println!("  {} Aborted", "✗".red());
        summary.skipped = execution.pending().count();
        return Ok(summary);
    }

    println!();
    for group in &execution.groups {
        let plan = &group.plan;
        let outcome = outcome(plan);
        if outcome == Outcome::Unchanged {
            summary.unchanged += 1;
            continue;
        }

        let pb = progress::spinner(&format!("Applying {}", plan.group));
        let result = client.apply_with_callback(plan, |index, change| {
            pb.set_message(format!(
                "[{}/{}] {}: {}",
                index + 1,
                plan.len(),
                plan.group,
                change
            ));
        });

        match result {
            Ok(applied) => {
                progress::finish_success(&pb, &format!("{} ({applied} statements)", plan.group));
                match outcome {
                    Outcome::Created => summary.created += 1,
                    Outcome::Recreated => summary.recreated += 1,
                    _ => summary.modified += 1,
                }
            }
            Err(e) => {
                progress::finish_error(&pb, &plan.group);
                report_failure(&e);
                summary.failed += 1;
            }
        }
    }

    print_summary(&summary);
    Ok(summary)
}

/// Print a failed group with category advice and partial progress
pub fn report_failure(error: &rgkit::Error) {
    let category = error.category();
    println!("    {} {}", "✗".red(), error_chain(error));
    if error.is_partial() {
        println!(
            "    {} Some changes were applied; the next plan will show what remains",
            "⚠".yellow()
        );
    }
    println!("    {}: {}", category.description().dimmed(), category.advice());
    if category.is_retryable() {
        println!("    {}", "This looks transient; re-running apply may succeed".dimmed());
    }
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!(
            "  {} Resource groups converged! ({} changed)",
            "✓".green().bold(),
            summary.total_changes()
        );
    } else {
        println!("  {} Applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} groups created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} groups modified", summary.modified);
    }
    if summary.recreated > 0 {
        println!("    • {} groups recreated", summary.recreated);
    }
    if summary.unchanged > 0 {
        println!("    • {} groups unchanged", summary.unchanged);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "groups".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgkit::{Classifier, ResourceGroupSpec, Strategy};

    fn plan(changes: Vec<Change>) -> Plan {
        Plan {
            group: "rg1".to_string(),
            strategy: Strategy::InPlace,
            changes,
            unverified: Vec::new(),
        }
    }

    #[test]
    fn test_outcome() {
        assert_eq!(outcome(&plan(vec![])), Outcome::Unchanged);
        assert_eq!(
            outcome(&plan(vec![Change::CreateGroup(ResourceGroupSpec::new("rg1"))])),
            Outcome::Created
        );
        assert_eq!(
            outcome(&plan(vec![
                Change::DropGroup,
                Change::CreateGroup(ResourceGroupSpec::new("rg1"))
            ])),
            Outcome::Recreated
        );
        assert_eq!(
            outcome(&plan(vec![Change::AddClassifier(Classifier::new().with_user("a"))])),
            Outcome::Modified
        );
    }

    #[test]
    fn test_summary_totals() {
        let summary = ExecuteSummary {
            created: 1,
            modified: 2,
            recreated: 1,
            unchanged: 4,
            ..Default::default()
        };
        assert_eq!(summary.total_changes(), 4);
        assert!(summary.is_success());
        assert!(!ExecuteSummary {
            failed: 1,
            ..Default::default()
        }
        .is_success());
    }
}

//! Diff computation and display - observed vs desired resource groups

use colored::Colorize;
use rgkit::{Change, Property, ResourceGroupSpec, Snapshot, canonicalize_mem_limit};
use similar::{ChangeTag, TextDiff};

use super::planner::{ExecutionPlan, GroupPlan};

/// Project observed state onto what the desired spec manages.
///
/// Unmanaged and unreported properties are dropped, classifier ids are
/// stripped and `mem_limit` is canonical on both sides, so the rendered
/// texts only differ where the plan will act.
pub fn comparable(observed: &Snapshot, desired: &ResourceGroupSpec) -> (ResourceGroupSpec, ResourceGroupSpec) {
    let mut have = ResourceGroupSpec::new(&desired.name);
    let mut want = desired.without_ids();
    want.mem_limit = want.mem_limit.as_deref().map(canonicalize_mem_limit);

    for (property, _) in desired.properties() {
        if !observed.reports(property) {
            clear(&mut want, property);
            continue;
        }
        if let Some(current) = observed.spec.get(property)
            && let Err(e) = have.set(property, current)
        {
            log::debug!("Not showing observed {property}: {e}");
        }
    }
    // Matched classifiers take the desired spelling (query types echo upper-cased).
    have.classifiers = observed
        .spec
        .without_ids()
        .classifiers
        .into_iter()
        .map(|c| want.classifiers.iter().find(|w| w.matches(&c)).cloned().unwrap_or(c))
        .collect();

    (have, want)
}

fn clear(spec: &mut ResourceGroupSpec, property: Property) {
    match property {
        Property::CpuWeight => spec.cpu_weight = None,
        Property::ExclusiveCpuCores => spec.exclusive_cpu_cores = None,
        Property::CpuCoreLimit => spec.cpu_core_limit = None,
        Property::MaxCpuCores => spec.max_cpu_cores = None,
        Property::MemLimit => spec.mem_limit = None,
        Property::ConcurrencyLimit => spec.concurrency_limit = None,
        Property::BigQueryMemLimit => spec.big_query_mem_limit = None,
        Property::BigQueryScanRowsLimit => spec.big_query_scan_rows_limit = None,
        Property::BigQueryCpuSecondLimit => spec.big_query_cpu_second_limit = None,
    }
}

/// Render a spec as it would appear in a manifest.
pub fn render(spec: &ResourceGroupSpec) -> String {
    toml::to_string_pretty(spec).unwrap_or_else(|e| format!("# could not render: {e}\n"))
}

/// Changed lines between observed and desired, as (tag, line) pairs
pub fn diff_lines(group: &GroupPlan) -> Vec<(ChangeTag, String)> {
    let (old, new) = match &group.observed {
        Some(observed) => {
            let (have, want) = comparable(observed, &group.desired);
            (render(&have), render(&want))
        }
        None => (String::new(), render(&group.desired.without_ids())),
    };

    TextDiff::from_lines(&old, &new)
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .map(|c| (c.tag(), c.to_string_lossy().trim_end().to_string()))
        .collect()
}

fn change_symbol(change: &Change) -> colored::ColoredString {
    match change {
        Change::CreateGroup(_) | Change::AddClassifier(_) => "+".green(),
        Change::DropGroup | Change::DropClassifier { .. } => "-".red(),
        Change::AlterProperties { .. } => "~".yellow(),
    }
}

/// Groups with desired properties the server has no column for, with their keys
pub fn unverified(execution: &ExecutionPlan) -> Vec<(&str, String)> {
    execution
        .groups
        .iter()
        .filter(|g| !g.plan.unverified.is_empty())
        .map(|g| {
            let keys: Vec<&str> = g.plan.unverified.iter().map(Property::key).collect();
            (g.plan.group.as_str(), keys.join(", "))
        })
        .collect()
}

/// An error followed by its causes, joined with ": "
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Display the plan in a user-friendly format
pub fn display_plan(execution: &ExecutionPlan, show_statements: bool) {
    for (name, error) in &execution.failures {
        println!();
        println!("  {} {} {}", "✗".red(), name.bold(), error_chain(error).red());
    }

    for (group, keys) in unverified(execution) {
        println!();
        println!(
            "  {} {}: server does not report {}; drift cannot be detected",
            "⚠".yellow(),
            group.bold(),
            keys
        );
    }

    if execution.is_converged() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Resource Group Plan".bold()
    );
    println!("│");

    for group in execution.pending() {
        let action = match group.observed {
            None => "(create)".green(),
            Some(_) => format!("({})", group.plan.strategy).yellow(),
        };
        println!("│ {} {}", group.plan.group.bold(), action);

        for (tag, line) in diff_lines(group) {
            match tag {
                ChangeTag::Delete => println!("│   {}", format!("- {line}").red()),
                ChangeTag::Insert => println!("│   {}", format!("+ {line}").green()),
                ChangeTag::Equal => {}
            }
        }

        println!("│");
        for (change, (_, statement)) in group.plan.changes.iter().zip(group.plan.statements()) {
            println!("│   {} {}", change_symbol(change), change);
            if show_statements {
                println!("│     {}", statement.dimmed());
            }
        }
        println!("│");
    }

    let groups = execution.pending().count();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes across {} resource group(s), {} unchanged",
        execution.change_count().to_string().bold(),
        groups.to_string().yellow(),
        (execution.groups.len() - groups).to_string().green()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

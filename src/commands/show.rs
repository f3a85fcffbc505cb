//! `show` and `import` - read observed resource group state

use anyhow::Result;
use colored::Colorize;
use rgkit::{Property, PropertyValue, ResourceGroupSpec, Snapshot};

use crate::Context;
use crate::cli::{ImportArgs, ShowArgs};
use crate::manifest::{self, Manifest};
use crate::ui;

/// Print the observed state of a group.
pub fn show(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let mut client = super::connect(ctx)?;
    let snapshot = client.import(&args.name)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    ui::header(&format!("Resource group {}", snapshot.spec.name));
    for (key, value) in property_rows(&snapshot) {
        ui::kv(&key, &value);
    }

    ui::section("Classifiers");
    if snapshot.classifiers().is_empty() {
        ui::dim("(none)");
    }
    for classifier in snapshot.classifiers() {
        println!("  {} {classifier}", "•".dimmed());
    }
    println!();
    Ok(())
}

/// Render an existing group as a manifest entry.
pub fn import(ctx: &Context, args: &ImportArgs) -> Result<()> {
    let mut client = super::connect(ctx)?;
    let snapshot = client.import(&args.name)?;
    let entry = manifest_entry(&snapshot);

    match &args.output {
        Some(path) => {
            let written = manifest::append(path, entry)?;
            if !ctx.quiet {
                ui::success(&format!("Imported '{}' into {}", args.name, written.display()));
            }
        }
        None => print!("{}", render_entry(entry)?),
    }
    Ok(())
}

/// The managed form of an observed group: ids stripped.
fn manifest_entry(snapshot: &Snapshot) -> ResourceGroupSpec {
    snapshot.spec.without_ids()
}

fn render_entry(entry: ResourceGroupSpec) -> Result<String> {
    Manifest {
        groups: vec![entry],
    }
    .to_toml()
}

/// Key/value rows for the table view, in render order.
fn property_rows(snapshot: &Snapshot) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let Some(id) = snapshot.id {
        rows.push(("id".to_string(), id.to_string()));
    }
    for property in Property::ALL {
        let value = match snapshot.spec.get(property) {
            Some(value) => format_value(property, &value),
            None if snapshot.reports(property) => "-".to_string(),
            None => continue,
        };
        rows.push((property.key().to_string(), value));
    }
    if let Some(threshold) = &snapshot.spill_mem_limit_threshold {
        rows.push(("spill_mem_limit_threshold".to_string(), threshold.clone()));
    }
    rows
}

fn format_value(property: Property, value: &PropertyValue) -> String {
    match (property, value) {
        (Property::BigQueryMemLimit, PropertyValue::Int(bytes)) if *bytes > 0 => {
            format!("{bytes} ({})", ui::format_size(bytes.unsigned_abs()))
        }
        _ => value.to_string(),
    }
}

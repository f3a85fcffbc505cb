//! `plan` and `apply` - converge resource groups to the manifest

use anyhow::{Result, bail};
use rgkit::Strategy;

use crate::Context;
use crate::cli::{ApplyArgs, PlanArgs};
use crate::engine::{self, ExecuteOptions};
use crate::manifest::Manifest;
use crate::ui;

fn strategy(ctx: &Context, args: &PlanArgs) -> Strategy {
    args.strategy
        .map_or(ctx.config.reconcile.strategy, Strategy::from)
}

/// Show what apply would change.
pub fn plan(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let manifest = Manifest::load(&args.file)?;
    let groups = manifest.select(&args.target)?;
    let strategy = strategy(ctx, args);

    let mut client = super::connect(ctx)?;
    let execution = engine::planner::build(&mut client, &groups, strategy);
    engine::differ::display_plan(&execution, true);

    if !execution.failures.is_empty() {
        bail!("{} resource group(s) could not be planned", execution.failures.len());
    }
    Ok(())
}

/// Converge resource groups, continuing past failing groups.
pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&args.plan.file)?;
    let groups = manifest.select(&args.plan.target)?;
    let strategy = strategy(ctx, &args.plan);

    if strategy == Strategy::Recreate && !ctx.quiet {
        ui::warn("Recreate drops each drifted group before creating it again; sessions may be unrouted in between");
    }

    let mut client = super::connect(ctx)?;
    let execution = engine::planner::build(&mut client, &groups, strategy);

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };
    let summary = engine::execute(&mut client, &execution, &opts)?;

    if !summary.is_success() {
        bail!("{} resource group(s) failed", summary.failed);
    }
    Ok(())
}

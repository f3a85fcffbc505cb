//! `destroy` - drop a resource group

use anyhow::Result;

use crate::Context;
use crate::cli::DestroyArgs;
use crate::{progress, ui};

pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    if !args.yes
        && !ui::confirm(
            &format!("Drop resource group '{}'? Its classifiers go with it", args.name),
            false,
        )?
    {
        ui::info("Aborted");
        return Ok(());
    }

    let mut client = super::connect(ctx)?;

    let pb = progress::spinner(&format!("Dropping {}", args.name));
    match client.delete(&args.name) {
        Ok(()) => {
            progress::finish_success(&pb, &format!("Dropped {}", args.name));
            Ok(())
        }
        Err(e) => {
            progress::finish_error(&pb, &args.name);
            crate::engine::executor::report_failure(&e);
            Err(e.into())
        }
    }
}

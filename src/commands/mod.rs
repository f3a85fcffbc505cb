//! Command implementations
//!
//! - `plan` / `apply` - converge resource groups to a manifest
//! - `show` / `import` - read observed state
//! - `destroy` - drop a resource group

pub mod apply;
pub mod destroy;
pub mod show;

use anyhow::{Context as AnyhowContext, Result};
use rgkit::Client;

use crate::Context;
use crate::progress;

/// Open a connection using the resolved settings.
pub fn connect(ctx: &Context) -> Result<Client> {
    let options = ctx.config.connect_options(&ctx.connection)?;
    let address = options.address();

    let pb = progress::spinner(&format!("Connecting to {address}"));
    let result = Client::connect(&options);
    pb.finish_and_clear();

    result.with_context(|| format!("Could not connect to {address} as {}", options.username))
}

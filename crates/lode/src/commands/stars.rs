//! `lode stars` command implementation.

use clap::Args;

use super::CommonArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the stars command.
#[derive(Args)]
pub(crate) struct StarsArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl StarsArgs {
    /// Execute the stars command.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let site = self.common.site()?;

        let stars = site.library_stars().await?;
        output.line(&format!("{} {stars}", site.library().name()));

        Ok(())
    }
}

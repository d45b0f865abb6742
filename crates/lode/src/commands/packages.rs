//! `lode packages` command implementation.

use clap::Args;
use lode_site::PackageError;

use super::CommonArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the packages command.
#[derive(Args)]
pub(crate) struct PackagesArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl PackagesArgs {
    /// Execute the packages command.
    ///
    /// Every workspace is listed, including private ones and those that fail
    /// to build.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let site = self.common.site()?;

        let snapshot = site.contrib().resolve_default().await?;
        output.highlight(&format!(
            "{}@{} ({})",
            snapshot.repository(),
            snapshot.git_ref(),
            snapshot.commit()
        ));
        output.separator();

        let inventory = site.contrib_inventory().await?;
        let mut public = 0;
        for (workspace, result) in &inventory {
            match result {
                Ok(package) => {
                    public += 1;
                    output.success(&format!(
                        "  {:<24} {} {}",
                        workspace.path, package.package_name, package.version
                    ));
                }
                Err(PackageError::Private { .. }) => {
                    output.muted(&format!("  {:<24} (private)", workspace.path));
                }
                Err(e) => {
                    output.warning(&format!("  {:<24} {e}", workspace.path));
                }
            }
        }

        output.separator();
        output.line(&format!(
            "{} workspaces, {public} public packages",
            inventory.len()
        ));

        Ok(())
    }
}

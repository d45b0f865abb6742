//! `lode package` command implementation.

use std::sync::Arc;

use clap::Args;

use super::CommonArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the package command.
#[derive(Args)]
pub(crate) struct PackageArgs {
    /// Workspace path in the contrib repository (e.g. `task-buffer`).
    workspace: String,

    /// Print the README with resolved symbol links.
    #[arg(long)]
    readme: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl PackageArgs {
    /// Execute the package command.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let site = self.common.site()?;

        let package = Arc::new(site.contrib_package(&self.workspace).await?);
        let resolver = site.link_resolver(Arc::clone(&package));

        output.highlight(&format!("{} {}", package.package_name, package.version));
        if let Some(description) = &package.description.text {
            output.line(description);
        }
        output.separator();
        output.line(&format!("License: {}", package.license));
        output.line(&format!("Source:  {}", package.links.source));
        output.line(&format!("JSR:     {}", package.links.jsr));
        output.line(&format!("npm:     {}", package.links.npm));
        for dependency in &package.dependencies {
            output.muted(&format!("  depends on {} {}", dependency.name, dependency.version));
        }

        for (key, path) in &package.exports {
            output.separator();
            output.highlight(&format!("{key} ({path})"));
            let nodes = package.docs.get(key).map(Vec::as_slice).unwrap_or_default();
            if nodes.is_empty() {
                output.muted("  no documented symbols");
            }
            for node in nodes {
                output.line(&format!("  {} {} [{}]", node.kind, node.name, node.id));
                if let Some(doc) = &node.doc {
                    let prose = resolver.render_prose(doc).await;
                    if let Some(first) = prose.lines().next() {
                        output.muted(&format!("      {first}"));
                    }
                }
            }
        }

        if self.readme {
            output.separator();
            output.line(&resolver.render_prose(&package.readme).await);
        }

        Ok(())
    }
}

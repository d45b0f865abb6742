//! `lode docs` command implementation.

use clap::Args;

use super::CommonArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the docs command.
#[derive(Args)]
pub(crate) struct DocsArgs {
    /// Guide id to show. Lists all guides when omitted.
    id: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl DocsArgs {
    /// Execute the docs command.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let site = self.common.site()?;
        let docs = site.docs();

        let Some(id) = self.id else {
            let index = docs.index().await?;
            let compiled = docs.all().await?;
            for topic in index.topics() {
                output.highlight(&topic.name);
                for meta in index.items(topic) {
                    if compiled.iter().any(|doc| doc.meta.id == meta.id) {
                        output.line(&format!("  {:<24} {}", meta.id, meta.title));
                    } else {
                        output.warning(&format!("  {:<24} {} (failed)", meta.id, meta.title));
                    }
                }
            }
            return Ok(());
        };

        let doc = docs
            .get_doc(Some(&id))
            .await?
            .ok_or_else(|| CliError::NotFound(format!("Guide {id}")))?;
        let index = docs.index().await?;

        output.highlight(&format!("{} ({})", doc.meta.title, index.topic_of(&doc.meta).name));
        output.separator();
        output.line(&doc.markdown);
        output.separator();
        if let Some(prev) = index.prev(&doc.meta) {
            output.muted(&format!("Previous: {} ({})", prev.title, prev.id));
        }
        if let Some(next) = index.next(&doc.meta) {
            output.muted(&format!("Next: {} ({})", next.title, next.id));
        }

        Ok(())
    }
}

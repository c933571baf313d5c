//! Export command handler.

use std::path::Path;

use anyhow::{Context, Result, bail};
use nipbot_core::config::Config;
use nipbot_core::export::TableExporter;
use nipbot_core::markdown::extract_tables;

use super::read_input;

pub async fn run(file: Option<&Path>, out_dir: Option<&Path>, config: &Config) -> Result<()> {
    let markdown = read_input(file)?;
    let tables = extract_tables(&markdown);
    if tables.is_empty() {
        bail!("No tables found in the input");
    }

    let mut export_config = config.export.clone();
    if let Some(dir) = out_dir {
        export_config.output_dir = Some(dir.to_string_lossy().into_owned());
    }

    let total = tables.len();
    let written = tokio::task::spawn_blocking(move || -> Result<_> {
        let exporter = TableExporter::from_config(&export_config)?;
        Ok(exporter.export_all(&tables))
    })
    .await
    .context("export task panicked")??;

    for path in &written {
        println!("{}", path.display());
    }
    if written.len() < total {
        bail!(
            "{} of {total} tables could not be exported; see the log for details",
            total - written.len()
        );
    }
    Ok(())
}

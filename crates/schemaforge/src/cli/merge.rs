use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use schemaforge_core::merge_with_report;
use serde_json::Value;

use super::emit;

pub fn run(paths: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => documents.push(value),
            Err(e) => eprintln!("Skipping {}: {e}", path.display()),
        }
    }

    let report = merge_with_report(&documents);
    if report.discarded_count() > 0 {
        eprintln!(
            "Discarded {} element(s) that are not schema documents",
            report.discarded_count()
        );
    }
    for issue in report.schema.validate() {
        eprintln!("Warning: {issue}");
    }

    emit(&report.schema.to_pretty_json()?, output)
}

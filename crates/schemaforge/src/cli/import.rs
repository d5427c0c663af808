use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use schemaforge_core::{
    ForgeConfig, HttpTransport, ImportError, ImportPipeline, JobOrchestrator, SchemaPayload,
    UploadItem,
};

use super::emit;

pub fn run(paths: &[PathBuf], output: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let config = ForgeConfig::load_or_default(config)?;
    tracing::debug!(
        "Submitting to {}, polling {} ({} polls)",
        config.submit_url,
        config.poll_url,
        config.poll_schedule.len()
    );
    let transport = HttpTransport::from_config(&config)?;
    let orchestrator =
        JobOrchestrator::new(Box::new(transport)).with_schedule(config.poll_schedule.clone());
    let pipeline = ImportPipeline::new().with_orchestrator(orchestrator);

    let runtime = tokio::runtime::Runtime::new()?;
    let imported = match runtime.block_on(pipeline.import_paths(paths)) {
        Ok(imported) => imported,
        Err(ImportError::Job {
            correlation_id,
            items,
            source,
        }) => {
            print_items(&items);
            bail!("job {correlation_id}: {source}");
        }
        Err(e) => return Err(e.into()),
    };

    eprintln!("Path: {}", imported.kind);
    if let Some(id) = &imported.correlation_id {
        eprintln!("Job: {id}");
    }
    print_items(&imported.items);

    match imported.payload {
        SchemaPayload::Parsed { schema, discarded } => {
            eprintln!(
                "Schema: {} entities, {} attributes ({discarded} discarded)",
                imported.stats.entities, imported.stats.attributes
            );
            emit(&schema.to_pretty_json()?, output)
        }
        SchemaPayload::Unparsed { raw, error } => {
            eprintln!("Result is not valid JSON ({error}); writing it unchanged for manual repair");
            emit(&raw, output)
        }
    }
}

fn print_items(items: &[UploadItem]) {
    for item in items {
        match &item.message {
            Some(message) => eprintln!("  {} [{}] {message}", item.file_name, item.status),
            None => eprintln!("  {} [{}]", item.file_name, item.status),
        }
    }
}

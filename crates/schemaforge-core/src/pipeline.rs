use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::watch;

use crate::classify::{BatchKind, UploadClassifier};
use crate::convert::{ConvertError, Converter, ScimConverter};
use crate::job::{CorrelationId, Job, JobError, JobOrchestrator};
use crate::merge::{merge_schemas, SchemaPayload};
use crate::upload::{UploadFile, UploadItem, UploadStatus};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No files to import")]
    Empty,
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("Extraction job {correlation_id} failed: {source}")]
    Job {
        correlation_id: CorrelationId,
        items: Vec<UploadItem>,
        source: JobError,
    },
    #[error("Batch needs async extraction but no extraction endpoint is configured")]
    NoOrchestrator,
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, Clone, Default)]
pub struct ImportStats {
    pub files: usize,
    pub entities: usize,
    pub attributes: usize,
    pub discarded: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ImportOutput {
    pub kind: BatchKind,
    pub payload: SchemaPayload,
    /// Set on the async path only.
    pub correlation_id: Option<CorrelationId>,
    pub items: Vec<UploadItem>,
    pub stats: ImportStats,
}

/// Classifies a batch, runs it down its path, and merges what comes back.
pub struct ImportPipeline {
    classifier: UploadClassifier,
    scim: Box<dyn Converter>,
    soap: Option<Box<dyn Converter>>,
    orchestrator: Option<JobOrchestrator>,
}

impl ImportPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            classifier: UploadClassifier::new(),
            scim: Box::new(ScimConverter::new()),
            soap: None,
            orchestrator: None,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: UploadClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_scim_converter(mut self, converter: Box<dyn Converter>) -> Self {
        self.scim = converter;
        self
    }

    #[must_use]
    pub fn with_soap_converter(mut self, converter: Box<dyn Converter>) -> Self {
        self.soap = Some(converter);
        self
    }

    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: JobOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    #[must_use]
    pub fn classify(&self, files: &[UploadFile]) -> BatchKind {
        self.classifier.classify(files)
    }

    pub async fn import_paths(&self, paths: &[PathBuf]) -> ImportResult<ImportOutput> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(read_file(path).await?);
        }
        self.import(files).await
    }

    pub async fn import(&self, files: Vec<UploadFile>) -> ImportResult<ImportOutput> {
        if files.is_empty() {
            return Err(ImportError::Empty);
        }

        let start = Instant::now();
        let file_count = files.len();
        let kind = self.classify(&files);
        tracing::info!("Classified {} file(s) as {}", file_count, kind);

        let (payload, correlation_id, items) = match kind {
            BatchKind::Scim => (self.convert(self.scim.as_ref(), &files).await?, None, Vec::new()),
            BatchKind::Soap => {
                let converter = self
                    .soap
                    .as_deref()
                    .ok_or(ConvertError::NoConverter(BatchKind::Soap))?;
                (self.convert(converter, &files).await?, None, Vec::new())
            }
            BatchKind::Generic => {
                let orchestrator = self.orchestrator.as_ref().ok_or(ImportError::NoOrchestrator)?;
                let outcome = run_job(orchestrator, Job::new(files)).await;
                match outcome.result {
                    Ok(payload) => (payload, Some(outcome.correlation_id), outcome.items),
                    Err(source) => {
                        return Err(ImportError::Job {
                            correlation_id: outcome.correlation_id,
                            items: outcome.items,
                            source,
                        })
                    }
                }
            }
        };

        let mut stats = ImportStats {
            files: file_count,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        };
        if let SchemaPayload::Parsed { schema, discarded } = &payload {
            stats.entities = schema.entities.len();
            stats.attributes = schema.entities.iter().map(|e| e.attributes.len()).sum();
            stats.discarded = *discarded;
        }

        Ok(ImportOutput {
            kind,
            payload,
            correlation_id,
            items,
            stats,
        })
    }

    async fn convert(
        &self,
        converter: &dyn Converter,
        files: &[UploadFile],
    ) -> ImportResult<SchemaPayload> {
        let schemas = converter.convert(files).await?;
        tracing::debug!("{} converter produced {} document(s)", converter.kind(), schemas.len());
        Ok(SchemaPayload::Parsed {
            schema: merge_schemas(&schemas),
            discarded: 0,
        })
    }
}

impl Default for ImportPipeline {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_file(path: &Path) -> ImportResult<UploadFile> {
    UploadFile::read(path).await.map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs the job while logging how many of its items have settled.
async fn run_job(orchestrator: &JobOrchestrator, job: Job) -> crate::job::JobOutcome {
    let progress = tokio::spawn(report_progress(
        job.correlation_id.clone(),
        job.board().subscribe(),
    ));

    let outcome = orchestrator.run(job).await;
    if let Err(e) = progress.await {
        tracing::debug!("Progress reporter stopped: {}", e);
    }
    outcome
}

async fn report_progress(correlation_id: CorrelationId, mut rx: watch::Receiver<Vec<UploadItem>>) {
    let mut last = None;
    while rx.changed().await.is_ok() {
        let (settled, total) = {
            let items = rx.borrow_and_update();
            let settled = items
                .iter()
                .filter(|i| i.status.is_terminal() || i.status == UploadStatus::Processing)
                .count();
            (settled, items.len())
        };
        if last != Some(settled) {
            tracing::info!("Job {}: {}/{} upload(s) settled", correlation_id, settled, total);
            last = Some(settled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertResult;
    use crate::job::{FileSubmission, JobTransport, PollResponse, PollSchedule, ResultPayload, TransportResult};
    use crate::schema::Schema;
    use serde_json::json;

    fn scim_file() -> UploadFile {
        let value = json!({
            "Resources": [{
                "id": "urn:ietf:params:scim:schemas:core:2.0:Group",
                "name": "Group",
                "attributes": [{"name": "displayName", "type": "string"}]
            }]
        });
        UploadFile::new("group.json", serde_json::to_vec(&value).unwrap())
    }

    struct InstantTransport {
        result: Option<ResultPayload>,
    }

    #[async_trait::async_trait]
    impl JobTransport for InstantTransport {
        async fn submit(&self, _submission: FileSubmission<'_>) -> TransportResult<()> {
            Ok(())
        }

        async fn poll(&self, _correlation_id: &CorrelationId) -> TransportResult<PollResponse> {
            Ok(self
                .result
                .clone()
                .map_or(PollResponse::Pending, PollResponse::Complete))
        }
    }

    fn orchestrator(result: Option<ResultPayload>) -> JobOrchestrator {
        JobOrchestrator::new(Box::new(InstantTransport { result }))
            .with_schedule(PollSchedule::from_secs(&[1, 1]))
    }

    #[tokio::test]
    async fn test_scim_batch_takes_sync_path() {
        let output = ImportPipeline::new()
            .import(vec![scim_file(), UploadFile::new("broken.json", b"{".to_vec())])
            .await
            .unwrap();

        assert_eq!(output.kind, BatchKind::Scim);
        assert!(output.correlation_id.is_none());
        let schema = output.payload.schema().unwrap();
        assert_eq!(schema.entity_names(), vec!["Group"]);
        assert_eq!(schema.name, crate::schema::DEFAULT_SCHEMA_NAME);
        assert_eq!(output.stats.entities, 1);
        assert_eq!(output.stats.attributes, 2);
    }

    #[tokio::test]
    async fn test_two_scim_documents_merge_first_wins() {
        let users = json!({"Resources": [
            {
                "id": "urn:ietf:params:scim:schemas:core:2.0:User",
                "name": "User",
                "attributes": [{"name": "userName", "type": "integer"}]
            },
            {
                "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ResourceType"],
                "id": "User",
                "name": "User",
                "schema": "urn:ietf:params:scim:schemas:core:2.0:User"
            }
        ]});
        let more = json!([
            {
                "id": "urn:ietf:params:scim:schemas:core:2.0:User",
                "name": "User",
                "attributes": [
                    {"name": "userName", "type": "string"},
                    {"name": "active", "type": "boolean"}
                ]
            },
            {
                "id": "urn:ietf:params:scim:schemas:core:2.0:Group",
                "name": "Group",
                "attributes": [{"name": "displayName", "type": "string"}]
            }
        ]);

        let output = ImportPipeline::new()
            .import(vec![
                UploadFile::new("users.json", serde_json::to_vec(&users).unwrap()),
                UploadFile::new("more.json", serde_json::to_vec(&more).unwrap()),
            ])
            .await
            .unwrap();

        assert_eq!(output.kind, BatchKind::Scim);
        let schema = output.payload.schema().unwrap();
        assert_eq!(schema.entity_names(), vec!["User", "Group"]);

        let user = schema.entity("User").unwrap();
        let names: Vec<&str> = user.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "userName", "active"]);
        assert_eq!(
            user.attribute("userName").unwrap().attr_type,
            crate::schema::AttributeType::Int
        );
        assert_eq!(output.stats.attributes, 5);
    }

    #[tokio::test]
    async fn test_soap_without_converter() {
        let wsdl = UploadFile::new(
            "svc.wsdl",
            br#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"/>"#.to_vec(),
        );
        let err = ImportPipeline::new().import(vec![wsdl]).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::Convert(ConvertError::NoConverter(BatchKind::Soap))
        ));
    }

    struct FixedConverter;

    #[async_trait::async_trait]
    impl Converter for FixedConverter {
        fn kind(&self) -> BatchKind {
            BatchKind::Soap
        }

        async fn convert(&self, _files: &[UploadFile]) -> ConvertResult<Vec<Schema>> {
            let doc = json!({"name": "Svc", "version": "2", "entities": [{"name": "Account", "attributes": []}]});
            Ok(vec![Schema::from_value(&doc).unwrap()])
        }
    }

    #[tokio::test]
    async fn test_soap_with_registered_converter() {
        let wsdl = UploadFile::new(
            "svc.wsdl",
            br#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"/>"#.to_vec(),
        );
        let output = ImportPipeline::new()
            .with_soap_converter(Box::new(FixedConverter))
            .import(vec![wsdl])
            .await
            .unwrap();

        let schema = output.payload.schema().unwrap();
        assert_eq!(schema.name, "Svc");
        assert_eq!(schema.entity_names(), vec!["Account"]);
    }

    #[tokio::test]
    async fn test_generic_without_orchestrator() {
        let pdf = UploadFile::new("manual.pdf", b"%PDF".to_vec());
        let err = ImportPipeline::new().import(vec![pdf]).await.unwrap_err();
        assert!(matches!(err, ImportError::NoOrchestrator));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_batch_goes_through_job() {
        let result = json!({"name": "", "version": "", "entities": [{"name": "User", "attributes": [{"name": "id", "type": "String", "IsKey": true}]}]});
        let pipeline = ImportPipeline::new()
            .with_orchestrator(orchestrator(Some(ResultPayload::Json(result))));

        let output = pipeline
            .import(vec![UploadFile::new("manual.pdf", b"%PDF".to_vec())])
            .await
            .unwrap();

        assert_eq!(output.kind, BatchKind::Generic);
        assert!(output.correlation_id.is_some());
        assert_eq!(output.items.len(), 1);
        assert_eq!(output.items[0].status, UploadStatus::Done);
        assert_eq!(output.payload.schema().unwrap().entity_names(), vec!["User"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_batch_exhaustion_surfaces_items() {
        let pipeline = ImportPipeline::new().with_orchestrator(orchestrator(None));

        let err = pipeline
            .import(vec![
                UploadFile::new("a.pdf", b"%PDF".to_vec()),
                UploadFile::new("b.txt", b"notes".to_vec()),
            ])
            .await
            .unwrap_err();

        match err {
            ImportError::Job { items, source, .. } => {
                assert_eq!(source, JobError::PollingExhausted { attempts: 2 });
                assert!(items.iter().all(|i| i.status == UploadStatus::Error));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_and_missing_paths() {
        let pipeline = ImportPipeline::new();
        assert!(matches!(pipeline.import(Vec::new()).await, Err(ImportError::Empty)));

        let missing = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(
            pipeline.import_paths(&[missing]).await,
            Err(ImportError::Io { .. })
        ));
    }
}

use chrono::{DateTime, Utc};
use futures::future::join_all;
use uuid::Uuid;

use super::correlation::CorrelationId;
use super::schedule::PollSchedule;
use super::transport::{FileSubmission, JobTransport, PollResponse, ResultPayload};
use crate::merge::{interpret_payload, SchemaPayload};
use crate::upload::{ItemBoard, UploadFile, UploadItem, UploadStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("No files to submit")]
    Empty,
    #[error("All {0} file uploads failed")]
    AllUploadsFailed(usize),
    #[error("No result within polling window ({attempts} polls)")]
    PollingExhausted { attempts: usize },
}

/// One submission on the async path. Lives only until polling resolves.
pub struct Job {
    pub correlation_id: CorrelationId,
    pub created_at: DateTime<Utc>,
    files: Vec<(Uuid, UploadFile)>,
    board: ItemBoard,
}

impl Job {
    #[must_use]
    pub fn new(files: Vec<UploadFile>) -> Self {
        let mut items = Vec::with_capacity(files.len());
        let files = files
            .into_iter()
            .map(|file| {
                let item = UploadItem::new(&file);
                let id = item.id;
                items.push(item);
                (id, file)
            })
            .collect();

        Self {
            correlation_id: CorrelationId::generate(),
            created_at: Utc::now(),
            files,
            board: ItemBoard::new(items),
        }
    }

    /// Live view of the job's items, for progress display.
    #[must_use]
    pub fn board(&self) -> &ItemBoard {
        &self.board
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub correlation_id: CorrelationId,
    pub items: Vec<UploadItem>,
    pub result: Result<SchemaPayload, JobError>,
}

impl JobOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives the async extraction path: concurrent per-file submission, then
/// sequential polling on a fixed schedule.
pub struct JobOrchestrator {
    transport: Box<dyn JobTransport>,
    schedule: PollSchedule,
}

impl JobOrchestrator {
    #[must_use]
    pub fn new(transport: Box<dyn JobTransport>) -> Self {
        Self {
            transport,
            schedule: PollSchedule::default(),
        }
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    #[must_use]
    pub fn schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    pub async fn submit(&self, files: Vec<UploadFile>) -> JobOutcome {
        self.run(Job::new(files)).await
    }

    pub async fn run(&self, job: Job) -> JobOutcome {
        let result = self.drive(&job).await;

        match &result {
            Ok(_) => {
                job.board.finish_all(UploadStatus::Done, None);
            }
            Err(e) => {
                job.board
                    .finish_all(UploadStatus::Error, Some(e.to_string().as_str()));
            }
        }

        JobOutcome {
            correlation_id: job.correlation_id.clone(),
            items: job.board.snapshot(),
            result,
        }
    }

    async fn drive(&self, job: &Job) -> Result<SchemaPayload, JobError> {
        if job.files.is_empty() {
            return Err(JobError::Empty);
        }

        tracing::info!(
            "Submitting {} file(s) as job {}",
            job.file_count(),
            job.correlation_id
        );

        // Every upload settles before polling starts; one failure does not
        // cancel its siblings.
        let uploads = job
            .files
            .iter()
            .map(|(item_id, file)| self.upload_one(job, *item_id, file));
        let accepted = join_all(uploads).await.into_iter().filter(|ok| *ok).count();

        if accepted == 0 {
            return Err(JobError::AllUploadsFailed(job.file_count()));
        }

        let payload = self.poll(&job.correlation_id).await?;
        Ok(interpret_payload(&payload))
    }

    async fn upload_one(&self, job: &Job, item_id: Uuid, file: &UploadFile) -> bool {
        job.board.set_status(item_id, UploadStatus::Uploading, None);

        let submission = FileSubmission {
            correlation_id: &job.correlation_id,
            file,
        };

        match self.transport.submit(submission).await {
            Ok(()) => {
                job.board.set_status(item_id, UploadStatus::Processing, None);
                true
            }
            Err(e) => {
                tracing::warn!("Upload of {} failed: {}", file.name, e);
                job.board
                    .set_status(item_id, UploadStatus::Error, Some(e.to_string()));
                false
            }
        }
    }

    /// One outstanding poll at a time, each after its scheduled wait.
    async fn poll(&self, correlation_id: &CorrelationId) -> Result<ResultPayload, JobError> {
        let attempts = self.schedule.len();

        for (attempt, delay) in self.schedule.iter().enumerate() {
            tokio::time::sleep(delay).await;

            match self.transport.poll(correlation_id).await {
                Ok(PollResponse::Complete(payload)) => {
                    tracing::info!(
                        "Job {} complete after poll {}/{}",
                        correlation_id,
                        attempt + 1,
                        attempts
                    );
                    return Ok(payload);
                }
                Ok(PollResponse::Pending) => {
                    tracing::debug!(
                        "Job {} pending, poll {}/{}",
                        correlation_id,
                        attempt + 1,
                        attempts
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Poll {}/{} for job {} failed: {}",
                        attempt + 1,
                        attempts,
                        correlation_id,
                        e
                    );
                }
            }
        }

        Err(JobError::PollingExhausted { attempts })
    }
}

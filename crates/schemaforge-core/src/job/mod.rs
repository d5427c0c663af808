mod correlation;
mod orchestrator;
mod schedule;
mod transport;

pub use correlation::{CorrelationId, InvalidCorrelationId, ALPHABET, CORRELATION_ID_LEN};
pub use orchestrator::{Job, JobError, JobOrchestrator, JobOutcome};
pub use schedule::{PollSchedule, DEFAULT_POLL_SCHEDULE_SECS};
pub use transport::{
    FileSubmission, HttpTransport, JobTransport, PollResponse, ResultPayload, TransportError,
    TransportResult,
};

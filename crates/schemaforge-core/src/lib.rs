pub mod classify;
pub mod config;
pub mod convert;
pub mod edit;
pub mod error;
pub mod job;
pub mod merge;
pub mod pipeline;
pub mod schema;
pub mod slot;
pub mod store;
pub mod upload;

pub use classify::{BatchKind, MarkerSoapDetector, SoapDetector, UploadClassifier};
pub use config::{ConfigError, ForgeConfig};
pub use convert::{ConvertError, Converter, ScimConverter};
pub use edit::{Edit, SchemaEditor};
pub use error::{Error, Result};
pub use job::{
    CorrelationId, HttpTransport, Job, JobError, JobOrchestrator, JobOutcome, JobTransport,
    PollSchedule,
};
pub use merge::{interpret_payload, merge, merge_with_report, MergeReport, SchemaPayload};
pub use pipeline::{ImportError, ImportOutput, ImportPipeline, ImportStats};
pub use schema::{Attribute, AttributeType, Entity, Schema, ShapeError, ValidationIssue};
pub use slot::SchemaSlot;
pub use store::{MemoryResultStore, ResultStore, StoreError, StoredResult};
pub use upload::{ItemBoard, UploadFile, UploadItem, UploadStatus};

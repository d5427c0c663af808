use std::time::Duration;

use reqwest::{multipart, Client, StatusCode};
use serde_json::Value;
use url::Url;

use super::correlation::CorrelationId;
use crate::config::ForgeConfig;
use crate::upload::UploadFile;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Transport failed: {0}")]
    Failed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// One file of a job, tagged with the job's correlation id.
#[derive(Debug, Clone, Copy)]
pub struct FileSubmission<'a> {
    pub correlation_id: &'a CorrelationId,
    pub file: &'a UploadFile,
}

/// A completed job's result, as the poll endpoint returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPayload {
    Text(String),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    Pending,
    Complete(ResultPayload),
}

impl PollResponse {
    /// Interprets a poll response body. Only a JSON object carrying a
    /// non-null `result` counts as complete; anything else well-formed is
    /// still pending.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(body) else {
            return Self::Pending;
        };

        match obj.remove("result") {
            None | Some(Value::Null) => Self::Pending,
            Some(Value::String(text)) => Self::Complete(ResultPayload::Text(text)),
            Some(value) => Self::Complete(ResultPayload::Json(value)),
        }
    }
}

/// The async extraction backend: per-file submission and result polling.
#[async_trait::async_trait]
pub trait JobTransport: Send + Sync {
    async fn submit(&self, submission: FileSubmission<'_>) -> TransportResult<()>;

    async fn poll(&self, correlation_id: &CorrelationId) -> TransportResult<PollResponse>;
}

/// Multipart upload and query-string polling over HTTP.
pub struct HttpTransport {
    client: Client,
    submit_url: Url,
    poll_url: Url,
}

impl HttpTransport {
    pub fn new(
        submit_url: Url,
        poll_url: Url,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            submit_url,
            poll_url,
        })
    }

    pub fn from_config(config: &ForgeConfig) -> crate::Result<Self> {
        let (submit_url, poll_url) = config.endpoints()?;
        Self::new(
            submit_url,
            poll_url,
            Duration::from_secs(u64::from(config.connect_timeout_seconds)),
            Duration::from_secs(u64::from(config.request_timeout_seconds)),
        )
        .map_err(Into::into)
    }

    fn form(submission: FileSubmission<'_>) -> TransportResult<multipart::Form> {
        let file = submission.file;
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(file.file_type())?;

        Ok(multipart::Form::new()
            .part("file", part)
            .text("request_id", submission.correlation_id.to_string())
            .text("filename", file.name.clone())
            .text("fileType", file.file_type())
            .text("size", file.size().to_string()))
    }
}

#[async_trait::async_trait]
impl JobTransport for HttpTransport {
    async fn submit(&self, submission: FileSubmission<'_>) -> TransportResult<()> {
        let form = Self::form(submission)?;
        let response = self
            .client
            .post(self.submit_url.clone())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                url: self.submit_url.to_string(),
            });
        }
        Ok(())
    }

    async fn poll(&self, correlation_id: &CorrelationId) -> TransportResult<PollResponse> {
        let response = self
            .client
            .get(self.poll_url.clone())
            .query(&[("request_id", correlation_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(PollResponse::Pending);
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: self.poll_url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(PollResponse::from_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_poll_body_with_string_result() {
        let body = json!({"request_id": "x", "result": "{\"entities\":[]}"}).to_string();
        assert_eq!(
            PollResponse::from_body(&body),
            PollResponse::Complete(ResultPayload::Text("{\"entities\":[]}".into()))
        );
    }

    #[test]
    fn test_poll_body_with_structured_result() {
        let body = json!({"result": [{"entities": []}]}).to_string();
        assert_eq!(
            PollResponse::from_body(&body),
            PollResponse::Complete(ResultPayload::Json(json!([{"entities": []}])))
        );
    }

    #[test]
    fn test_other_bodies_are_pending() {
        assert_eq!(PollResponse::from_body(""), PollResponse::Pending);
        assert_eq!(PollResponse::from_body("accepted"), PollResponse::Pending);
        assert_eq!(PollResponse::from_body("{}"), PollResponse::Pending);
        assert_eq!(
            PollResponse::from_body(r#"{"result": null}"#),
            PollResponse::Pending
        );
        assert_eq!(PollResponse::from_body("[1,2]"), PollResponse::Pending);
    }

    #[test]
    fn test_form_builds_for_upload() {
        let id = CorrelationId::generate();
        let file = UploadFile::new("manual.pdf", b"%PDF-1.7".to_vec());
        let form = HttpTransport::form(FileSubmission {
            correlation_id: &id,
            file: &file,
        });
        assert!(form.is_ok());
    }
}

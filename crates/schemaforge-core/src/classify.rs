use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::upload::UploadFile;

pub const SCIM_RESOURCE_TYPE_URN: &str = "urn:ietf:params:scim:schemas:core:2.0:ResourceType";

const SOAP_EXTENSIONS: [&str; 3] = ["xml", "wsdl", "xsd"];

/// Which processing path an upload batch takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Scim,
    Soap,
    Generic,
}

impl BatchKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scim => "scim",
            Self::Soap => "soap",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a batch is SOAP/WSDL material.
pub trait SoapDetector: Send + Sync {
    fn is_soap(&self, files: &[UploadFile]) -> bool;
}

/// Sniffs XML-family files for WSDL definitions, XML Schema roots, and
/// SOAP envelopes.
pub struct MarkerSoapDetector {
    markers: Vec<Regex>,
}

impl MarkerSoapDetector {
    #[must_use]
    pub fn new() -> Self {
        let patterns = [
            r"(?i)<(?:[\w-]+:)?definitions\b",
            r"(?i)schemas\.xmlsoap\.org/wsdl",
            r"(?i)<(?:[\w-]+:)?schema\b[^>]*www\.w3\.org/2001/XMLSchema",
            r"(?i)<(?:[\w-]+:)?Envelope\b[^>]*soap",
        ];

        let markers = patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        Self { markers }
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Regex) -> Self {
        self.markers.push(marker);
        self
    }

    fn matches(&self, file: &UploadFile) -> bool {
        let text = file.text();
        self.markers.iter().any(|m| m.is_match(&text))
    }
}

impl Default for MarkerSoapDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SoapDetector for MarkerSoapDetector {
    fn is_soap(&self, files: &[UploadFile]) -> bool {
        files
            .iter()
            .filter(|f| f.has_extension(&SOAP_EXTENSIONS))
            .any(|f| self.matches(f))
    }
}

fn has_array(obj: &serde_json::Map<String, Value>, field: &str) -> bool {
    obj.get(field).is_some_and(Value::is_array)
}

fn is_schema_resource(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("id") && has_array(obj, "attributes"))
}

fn is_resource_type(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let declares_urn = obj
        .get("schemas")
        .and_then(Value::as_array)
        .is_some_and(|urns| urns.iter().any(|u| u.as_str() == Some(SCIM_RESOURCE_TYPE_URN)));

    let has_schema_ref = obj.get("schema").is_some_and(Value::is_string)
        && (obj.contains_key("endpoint") || obj.contains_key("name"));

    declares_urn || has_schema_ref
}

/// Recognizes the SCIM shapes this system consumes: a `Resources`
/// envelope holding attribute-bearing resources, a standalone schema
/// resource, or a resource type (alone or in an array).
#[must_use]
pub fn is_scim_document(value: &Value) -> bool {
    match value {
        Value::Object(obj) => {
            let envelope = obj
                .get("Resources")
                .and_then(Value::as_array)
                .is_some_and(|resources| {
                    resources.iter().any(|r| {
                        r.as_object().is_some_and(|o| has_array(o, "attributes"))
                            || is_resource_type(r)
                    })
                });
            envelope || is_schema_resource(value) || is_resource_type(value)
        }
        Value::Array(items) => items
            .iter()
            .any(|item| is_resource_type(item) || is_schema_resource(item)),
        _ => false,
    }
}

/// Picks the processing path for a batch by inspecting file contents.
pub struct UploadClassifier {
    soap: Box<dyn SoapDetector>,
}

impl UploadClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            soap: Box::new(MarkerSoapDetector::new()),
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Box<dyn SoapDetector>) -> Self {
        self.soap = detector;
        self
    }

    /// Malformed files are skipped; the batch classifies on whatever
    /// does parse.
    #[must_use]
    pub fn classify(&self, files: &[UploadFile]) -> BatchKind {
        if files.iter().any(is_scim_file) {
            return BatchKind::Scim;
        }
        if self.soap.is_soap(files) {
            return BatchKind::Soap;
        }
        BatchKind::Generic
    }
}

impl Default for UploadClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn is_scim_file(file: &UploadFile) -> bool {
    if !file.has_extension(&["json"]) {
        return false;
    }
    match serde_json::from_slice::<Value>(&file.bytes) {
        Ok(value) => is_scim_document(&value),
        Err(e) => {
            tracing::debug!("Skipping {} during classification: {}", file.name, e);
            false
        }
    }
}

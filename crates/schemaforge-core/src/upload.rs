use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// A user-selected file, held in memory for classification and upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self { name, bytes })
    }

    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    #[must_use]
    pub fn has_extension(&self, extensions: &[&str]) -> bool {
        self.extension()
            .is_some_and(|ext| extensions.contains(&ext.as_str()))
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    #[must_use]
    pub fn file_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("json") => "application/json",
            Some("xml" | "wsdl" | "xsd") => "application/xml",
            Some("txt" | "md") => "text/plain",
            Some("csv") => "text/csv",
            Some("html" | "htm") => "text/html",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Processing,
    Done,
    Error,
}

impl UploadStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Uploading => 1,
            Self::Processing => 2,
            Self::Done | Self::Error => 3,
        }
    }

    /// Statuses only move forward, and `done`/`error` are final.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: Uuid,
    pub file_name: String,
    pub size: u64,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadItem {
    #[must_use]
    pub fn new(file: &UploadFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file.name.clone(),
            size: file.size(),
            status: UploadStatus::Pending,
            message: None,
        }
    }

    /// Returns the item in its next status, or `None` if the move is not
    /// allowed from the current one.
    #[must_use]
    pub fn transition(&self, status: UploadStatus, message: Option<String>) -> Option<Self> {
        if !self.status.can_transition_to(status) {
            return None;
        }
        Some(Self {
            status,
            message,
            ..self.clone()
        })
    }
}

/// Shared list of upload items.
///
/// Every update swaps in a whole new item value under the channel lock, so
/// subscribers only ever observe complete snapshots.
#[derive(Debug, Clone)]
pub struct ItemBoard {
    tx: watch::Sender<Vec<UploadItem>>,
}

impl ItemBoard {
    #[must_use]
    pub fn new(items: Vec<UploadItem>) -> Self {
        let (tx, _rx) = watch::channel(items);
        Self { tx }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<UploadItem> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadItem>> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<UploadItem> {
        self.tx.borrow().iter().find(|i| i.id == id).cloned()
    }

    pub fn set_status(&self, id: Uuid, status: UploadStatus, message: Option<String>) -> bool {
        self.tx.send_if_modified(|items| {
            let Some(pos) = items.iter().position(|i| i.id == id) else {
                return false;
            };
            match items[pos].transition(status, message) {
                Some(next) => {
                    tracing::debug!("{}: {} -> {}", next.file_name, items[pos].status, status);
                    items[pos] = next;
                    true
                }
                None => false,
            }
        })
    }

    /// Moves every non-terminal item to `status`. Items already finished
    /// keep their outcome. Returns how many items changed.
    pub fn finish_all(&self, status: UploadStatus, message: Option<&str>) -> usize {
        let mut changed = 0;
        self.tx.send_if_modified(|items| {
            let next: Vec<UploadItem> = items
                .iter()
                .map(|item| {
                    item.transition(status, message.map(String::from))
                        .inspect(|_| changed += 1)
                        .unwrap_or_else(|| item.clone())
                })
                .collect();
            *items = next;
            changed > 0
        });
        changed
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.tx.send_if_modified(|items| {
            let before = items.len();
            items.retain(|i| i.id != id);
            items.len() != before
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> UploadItem {
        UploadItem::new(&UploadFile::new(name, b"content".to_vec()))
    }

    #[test]
    fn test_status_moves_forward_only() {
        use UploadStatus::*;

        assert!(Pending.can_transition_to(Uploading));
        assert!(Uploading.can_transition_to(Processing));
        assert!(Uploading.can_transition_to(Error));
        assert!(Processing.can_transition_to(Done));
        assert!(!Processing.can_transition_to(Uploading));
        assert!(!Done.can_transition_to(Error));
        assert!(!Error.can_transition_to(Done));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_item_transition_returns_new_value() {
        let original = item("a.pdf");
        let next = original
            .transition(UploadStatus::Error, Some("boom".into()))
            .unwrap();

        assert_eq!(original.status, UploadStatus::Pending);
        assert_eq!(next.status, UploadStatus::Error);
        assert_eq!(next.message.as_deref(), Some("boom"));
        assert!(next.transition(UploadStatus::Done, None).is_none());
    }

    #[test]
    fn test_board_rejects_backward_moves() {
        let a = item("a.pdf");
        let id = a.id;
        let board = ItemBoard::new(vec![a]);

        assert!(board.set_status(id, UploadStatus::Processing, None));
        assert!(!board.set_status(id, UploadStatus::Uploading, None));
        assert_eq!(board.get(id).unwrap().status, UploadStatus::Processing);
        assert!(!board.set_status(Uuid::new_v4(), UploadStatus::Done, None));
    }

    #[test]
    fn test_finish_all_keeps_terminal_items() {
        let a = item("a.pdf");
        let b = item("b.pdf");
        let (a_id, b_id) = (a.id, b.id);
        let board = ItemBoard::new(vec![a, b]);

        board.set_status(a_id, UploadStatus::Error, Some("upload failed".into()));
        board.set_status(b_id, UploadStatus::Processing, None);

        assert_eq!(board.finish_all(UploadStatus::Done, None), 1);
        let a = board.get(a_id).unwrap();
        assert_eq!(a.status, UploadStatus::Error);
        assert_eq!(a.message.as_deref(), Some("upload failed"));
        assert_eq!(board.get(b_id).unwrap().status, UploadStatus::Done);
    }

    #[tokio::test]
    async fn test_subscribers_see_snapshots() {
        let a = item("a.pdf");
        let id = a.id;
        let board = ItemBoard::new(vec![a]);
        let mut rx = board.subscribe();

        board.set_status(id, UploadStatus::Uploading, None);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].status, UploadStatus::Uploading);

        assert!(board.remove(id));
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[test]
    fn test_upload_file_metadata() {
        let file = UploadFile::new("Service.WSDL", b"<definitions/>".to_vec());
        assert_eq!(file.extension().as_deref(), Some("wsdl"));
        assert!(file.has_extension(&["wsdl", "xsd"]));
        assert_eq!(file.file_type(), "application/xml");
        assert_eq!(file.size(), 14);

        let unknown = UploadFile::new("README", Vec::new());
        assert_eq!(unknown.extension(), None);
        assert_eq!(unknown.file_type(), "application/octet-stream");
    }
}

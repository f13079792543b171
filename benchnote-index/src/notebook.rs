//! Notebook entry and page models, plus the collaborator seams.
//!
//! The notebook-fetching client (tree traversal, XML parsing, upload
//! workflow) lives outside this crate; it feeds the pipeline through
//! [`EntryProvider`]. Ranked search hits flow out through [`HitConsumer`].

use crate::chunk_record::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw entry of a notebook page, as delivered by the external
/// notebook service.
///
/// Timestamps stay raw strings here: the service is not consistent about
/// formats, and the pipeline treats unparseable stamps as "unknown"
/// rather than failing a whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub id: String,
    /// Part type as reported by the service, e.g. `"plain text"`.
    pub part_type: String,
    pub content: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl NotebookEntry {
    /// Part type normalized for matching: lower-cased, spaces replaced
    /// with underscores.
    pub fn normalized_part_type(&self) -> String {
        self.part_type.trim().to_lowercase().replace(' ', "_")
    }
}

/// A notebook page with its entries and display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookPage {
    pub notebook_id: String,
    pub notebook_title: String,
    pub page_id: String,
    pub title: String,
    pub author: String,
    /// Resolvable URL back to the page in the notebook service.
    pub url: String,
    pub folder_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub entries: Vec<NotebookEntry>,
}

/// Source of notebook pages; implemented by the external notebook client.
#[async_trait]
pub trait EntryProvider: Send + Sync {
    /// All pages, optionally restricted to one notebook.
    async fn pages(&self, notebook_id: Option<&str>) -> Result<Vec<NotebookPage>>;
}

/// Consumer of ranked search hits.
pub trait HitConsumer: Send {
    fn accept(&mut self, hits: &[SearchResult]);
}

impl<F: FnMut(&[SearchResult]) + Send> HitConsumer for F {
    fn accept(&mut self, hits: &[SearchResult]) {
        self(hits)
    }
}

/// Parse a notebook timestamp into UTC.
///
/// Accepts RFC 3339 and the two naive formats the service emits; naive
/// stamps are taken as UTC. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(part_type: &str) -> NotebookEntry {
        NotebookEntry {
            id: "e1".to_string(),
            part_type: part_type.to_string(),
            content: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn part_types_normalize_to_lowercase_underscores() {
        assert_eq!(entry("Plain Text").normalized_part_type(), "plain_text");
        assert_eq!(entry("HEADING").normalized_part_type(), "heading");
        assert_eq!(entry(" text ").normalized_part_type(), "text");
    }

    #[test]
    fn timestamps_parse_from_known_formats() {
        assert_eq!(
            parse_timestamp("2025-10-01T12:00:00Z").unwrap().to_rfc3339(),
            "2025-10-01T12:00:00+00:00"
        );
        assert!(parse_timestamp("2025-10-01T12:00:00+02:00").is_some());
        assert!(parse_timestamp("2025-10-01 12:00:00").is_some());
        assert!(parse_timestamp("2025-10-01T12:00:00").is_some());
    }

    #[test]
    fn bad_timestamps_parse_to_none() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("01/10/2025").is_none());
    }
}

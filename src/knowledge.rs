//! Static knowledge index queried by the AI engine.
//!
//! Items are loaded once from a TOML file:
//!
//! ```toml
//! [[items]]
//! topic = "Pendirian PT"
//! question = "Bagaimana cara mendirikan PT?"
//! answer = "..."
//! keywords = ["pt", "perseroan"]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;

/// Upper bound on items returned by [`KnowledgeIndex::find_relevant`].
pub const MAX_RELEVANT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub topic: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl KnowledgeItem {
    /// `lowered` must already be lowercase.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| lowered.contains(&k.to_lowercase()))
    }
}

#[derive(Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    items: Vec<KnowledgeItem>,
}

/// Read-only, ordered list of knowledge items.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeIndex {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        Self { items }
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read knowledge file {}: {e}", path.display())))?;
        let file: KnowledgeFile = toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;
        info!(path = %path.display(), items = file.items.len(), "knowledge index loaded");
        Ok(Self::new(file.items))
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items with at least one keyword contained in `message`
    /// (case-insensitive), first [`MAX_RELEVANT`] in index order.
    pub fn find_relevant(&self, message: &str) -> Vec<&KnowledgeItem> {
        let lowered = message.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.matches(&lowered))
            .take(MAX_RELEVANT)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn item(topic: &str, keywords: &[&str]) -> KnowledgeItem {
        KnowledgeItem {
            topic: topic.into(),
            question: format!("{topic}?"),
            answer: format!("about {topic}"),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn index() -> KnowledgeIndex {
        KnowledgeIndex::new(vec![
            item("PT", &["PT", "perseroan"]),
            item("CV", &["cv"]),
            item("ISO", &["iso", "sertifikasi"]),
            item("HAKI", &["merek", "paten"]),
            item("NIB", &["nib"]),
        ])
    }

    #[test]
    fn matches_case_insensitively() {
        let idx = index();
        let found = idx.find_relevant("Mau bikin pt dong");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic, "PT");
    }

    #[test]
    fn caps_at_three_in_index_order() {
        let idx = index();
        let found = idx.find_relevant("pt, cv, iso, merek dan nib");
        let topics: Vec<_> = found.iter().map(|i| i.topic.as_str()).collect();
        assert_eq!(topics, vec!["PT", "CV", "ISO"]);
    }

    #[test]
    fn every_result_has_a_matching_keyword() {
        let idx = index();
        let msg = "sertifikasi dan paten";
        for it in idx.find_relevant(msg) {
            assert!(it.keywords.iter().any(|k| msg.contains(&k.to_lowercase())));
        }
    }

    #[test]
    fn no_match_is_empty() {
        assert!(index().find_relevant("halo selamat pagi").is_empty());
    }

    #[test]
    fn empty_keyword_never_matches() {
        let idx = KnowledgeIndex::new(vec![item("blank", &[""])]);
        assert!(idx.find_relevant("anything").is_empty());
    }

    #[test]
    fn loads_from_toml() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(
            br#"
[[items]]
topic = "SBU"
question = "Apa itu SBU?"
answer = "Sertifikat Badan Usaha"
keywords = ["sbu", "konstruksi"]
"#,
        )
        .unwrap();
        let idx = KnowledgeIndex::load(f.path()).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.items()[0].keywords, vec!["sbu", "konstruksi"]);
    }

    #[test]
    fn load_missing_file_errors() {
        assert!(KnowledgeIndex::load(Path::new("/nonexistent/knowledge.toml")).is_err());
    }
}

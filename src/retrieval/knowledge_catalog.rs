//! Static knowledge catalog.
//!
//! Loaded once at start-up from a JSON file of the form
//!
//! ```json
//! [{"id": 17, "title": "函数的零点", "content": {"basic_concept": "…", "solving_tips": "…"}}]
//! ```
//!
//! and used read-only afterwards. Missing sub-fields default to empty strings.

use std::path::Path;

use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error_handling::types::ConfigError;

/// The five fixed sub-fields of a knowledge entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeContent {
    pub basic_concept: String,
    pub basic_operation: String,
    pub common_theorems: String,
    pub example_problems: String,
    pub solving_tips: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: KnowledgeContent,
}

/// Knowledge item as returned to clients and persisted per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub title: String,
    pub content: KnowledgeContent,
}

impl From<&CatalogEntry> for KnowledgeItem {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            title: entry.title.clone(),
            content: entry.content.clone(),
        }
    }
}

/// Catalog line shown to the category classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryKeyword {
    pub id: String,
    pub keyword: String,
}

fn id_from_number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }
    Ok(match RawId::deserialize(d)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeCatalog {
    entries: Vec<CatalogEntry>,
}

impl KnowledgeCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(raw).map_err(|e| ConfigError::CatalogError(e.to_string()))?;
        Ok(Self::new(entries))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&raw)?;
        info!(
            "Loaded {} knowledge categories from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keywords(&self) -> Vec<CategoryKeyword> {
        self.entries
            .iter()
            .map(|e| CategoryKeyword {
                id: e.id.clone(),
                keyword: e.title.clone(),
            })
            .collect()
    }

    /// Entry with the given id; the last one wins when ids repeat.
    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().rev().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {"id": 17, "title": "函数的零点", "content": {"basic_concept": "f(x)=0 的解", "solving_tips": "因式分解"}},
        {"id": "18", "title": "二次函数"},
        {"id": 19}
    ]"#;

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let catalog = KnowledgeCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.find("17").is_some());
        assert!(catalog.find("18").is_some());
        assert!(catalog.find("20").is_none());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let catalog = KnowledgeCatalog::from_json(SAMPLE).unwrap();
        let zero = KnowledgeItem::from(catalog.find("17").unwrap());
        assert_eq!(zero.content.basic_concept, "f(x)=0 的解");
        assert_eq!(zero.content.basic_operation, "");
        assert_eq!(zero.content.common_theorems, "");

        let bare = catalog.find("19").unwrap();
        assert_eq!(bare.title, "");
        assert_eq!(bare.content, KnowledgeContent::default());
    }

    #[test]
    fn test_keywords_pair_id_and_title() {
        let catalog = KnowledgeCatalog::from_json(SAMPLE).unwrap();
        let keywords = catalog.keywords();
        assert_eq!(
            keywords[1],
            CategoryKeyword {
                id: "18".into(),
                keyword: "二次函数".into()
            }
        );
    }

    #[test]
    fn test_from_file_and_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        assert_eq!(KnowledgeCatalog::from_file(file.path()).unwrap().len(), 3);

        assert!(matches!(
            KnowledgeCatalog::from_json("{\"id\": 1}"),
            Err(ConfigError::CatalogError(_))
        ));
    }
}

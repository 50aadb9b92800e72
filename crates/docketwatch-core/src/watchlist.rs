//! The entity watch-list: which organisations and programmes dockets are matched against.
//!
//! Loaded once at startup from a JSON array and immutable afterwards:
//!
//! ```json
//! [
//!   {
//!     "id": "doge",
//!     "name": "Department of Government Efficiency",
//!     "keywords": ["Department of Government Efficiency", "DOGE"],
//!     "gov_entity": true
//!   }
//! ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("failed to read watch-list {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("watch-list JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("watch-list is empty")]
    Empty,
    #[error("duplicate entity id in watch-list: {0}")]
    DuplicateId(String),
    #[error("entity {0} has no keywords and is not a government entity")]
    NoSignals(String),
}

/// A watch-list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    /// Case-insensitive substrings searched for in the case name fields.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Enables the jurisdiction / cause-of-action heuristic.
    #[serde(default, rename = "gov_entity")]
    pub is_government_entity: bool,
}

/// Validated, ordered set of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchList {
    entities: Vec<Entity>,
}

impl WatchList {
    pub fn new(entities: Vec<Entity>) -> Result<Self, WatchlistError> {
        if entities.is_empty() {
            return Err(WatchlistError::Empty);
        }
        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.id.as_str()) {
                return Err(WatchlistError::DuplicateId(entity.id.clone()));
            }
            let has_keyword = entity.keywords.iter().any(|k| !k.trim().is_empty());
            if !has_keyword && !entity.is_government_entity {
                return Err(WatchlistError::NoSignals(entity.id.clone()));
            }
        }
        Ok(Self { entities })
    }

    pub fn from_json_str(json: &str) -> Result<Self, WatchlistError> {
        let entities: Vec<Entity> = serde_json::from_str(json)?;
        Self::new(entities)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, WatchlistError> {
        let json = std::fs::read_to_string(path).map_err(|source| WatchlistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let list = Self::from_json_str(&json)?;
        info!(path = %path.display(), entities = list.len(), "loaded watch-list");
        Ok(list)
    }

    /// Built-in watch-list used when no file is configured.
    pub fn builtin() -> Self {
        Self {
            entities: vec![Entity {
                id: "doge".into(),
                name: "Department of Government Efficiency".into(),
                keywords: vec!["Department of Government Efficiency".into(), "DOGE".into()],
                is_government_entity: true,
            }],
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gov_entity_flag() {
        let list = WatchList::from_json_str(
            r#"[
                {"id": "doge", "name": "DOGE", "keywords": ["DOGE"], "gov_entity": true},
                {"id": "usds", "name": "U.S. Digital Service", "keywords": ["Digital Service"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.entities()[0].is_government_entity);
        assert!(!list.entities()[1].is_government_entity);
    }

    #[test]
    fn rejects_empty_list() {
        assert!(matches!(
            WatchList::from_json_str("[]"),
            Err(WatchlistError::Empty)
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = WatchList::from_json_str(
            r#"[
                {"id": "a", "name": "A", "keywords": ["a"]},
                {"id": "a", "name": "A again", "keywords": ["b"]}
            ]"#,
        );
        assert!(matches!(result, Err(WatchlistError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn rejects_entity_that_can_never_match() {
        let result = WatchList::from_json_str(r#"[{"id": "x", "name": "X", "keywords": ["  "]}]"#);
        assert!(matches!(result, Err(WatchlistError::NoSignals(id)) if id == "x"));
    }

    #[test]
    fn keyword_free_government_entity_is_allowed() {
        let list =
            WatchList::from_json_str(r#"[{"id": "gov", "name": "Gov", "gov_entity": true}]"#)
                .unwrap();
        assert!(list.entities()[0].keywords.is_empty());
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("entities.json");
        std::fs::write(&path, r#"[{"id": "doge", "name": "DOGE", "keywords": ["DOGE"]}]"#)
            .unwrap();
        let list = WatchList::load(&path).unwrap();
        assert_eq!(list.entities()[0].id, "doge");
    }

    #[test]
    fn load_missing_file_errors() {
        let result = WatchList::load(Path::new("/nonexistent/entities.json"));
        assert!(matches!(result, Err(WatchlistError::Io { .. })));
    }

    #[test]
    fn builtin_is_valid() {
        let builtin = WatchList::builtin();
        assert_eq!(WatchList::new(builtin.entities().to_vec()).unwrap(), builtin);
    }
}

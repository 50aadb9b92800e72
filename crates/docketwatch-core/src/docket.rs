//! Docket records as fetched from CourtListener, and the verdicts derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Public site origin that CourtListener's `absolute_url` paths are relative to.
pub const COURTLISTENER_ORIGIN: &str = "https://www.courtlistener.com";

/// CourtListener docket primary key.
pub type DocketId = u64;

/// A docket as returned by the upstream `/dockets/` endpoint.
///
/// Read-only input to classification. Optional text fields are `None` when the
/// upstream value is absent, `null`, or an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocketRecord {
    pub id: DocketId,
    pub case_name: String,
    pub case_name_short: Option<String>,
    pub case_name_full: Option<String>,
    pub docket_number: String,
    pub court_id: String,
    pub date_filed: String,
    pub absolute_url: String,
    pub jurisdiction_type: Option<String>,
    pub nature_of_suit: Option<String>,
    pub cause: Option<String>,
}

/// A docket object that could not be turned into a [`DocketRecord`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed docket {}: {reason}", display_id(.id))]
pub struct MalformedDocket {
    pub id: Option<DocketId>,
    pub reason: String,
}

/// Lenient wire shape: every field optional so that missing-field errors can
/// name the field instead of failing the whole page.
#[derive(Deserialize)]
struct WireDocket {
    id: Option<DocketId>,
    case_name: Option<String>,
    case_name_short: Option<String>,
    case_name_full: Option<String>,
    docket_number: Option<String>,
    court_id: Option<String>,
    date_filed: Option<String>,
    absolute_url: Option<String>,
    jurisdiction_type: Option<String>,
    nature_of_suit: Option<String>,
    cause: Option<String>,
}

impl DocketRecord {
    /// Parse one element of a `results` array.
    pub fn from_value(value: &Value) -> Result<Self, MalformedDocket> {
        let id = value.get("id").and_then(Value::as_u64);
        let wire: WireDocket = serde_json::from_value(value.clone()).map_err(|e| MalformedDocket {
            id,
            reason: e.to_string(),
        })?;

        let id = wire.id.ok_or_else(|| MalformedDocket {
            id: None,
            reason: "missing field `id`".into(),
        })?;
        let required = |field: Option<String>, name: &str| {
            non_empty(field).ok_or_else(|| MalformedDocket {
                id: Some(id),
                reason: format!("missing field `{name}`"),
            })
        };

        Ok(Self {
            id,
            case_name: required(wire.case_name, "case_name")?,
            case_name_short: non_empty(wire.case_name_short),
            case_name_full: non_empty(wire.case_name_full),
            docket_number: required(wire.docket_number, "docket_number")?,
            court_id: required(wire.court_id, "court_id")?,
            date_filed: required(wire.date_filed, "date_filed")?,
            absolute_url: required(wire.absolute_url, "absolute_url")?,
            jurisdiction_type: non_empty(wire.jurisdiction_type),
            nature_of_suit: non_empty(wire.nature_of_suit),
            cause: non_empty(wire.cause),
        })
    }

    /// Public URL of the docket page.
    pub fn public_url(&self) -> String {
        if self.absolute_url.starts_with("http://") || self.absolute_url.starts_with("https://") {
            self.absolute_url.clone()
        } else {
            format!("{COURTLISTENER_ORIGIN}{}", self.absolute_url)
        }
    }
}

fn display_id(id: &Option<DocketId>) -> String {
    id.map_or_else(|| "<no id>".to_string(), |id| id.to_string())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Display copy of a matched docket, as served to the presentation layer.
///
/// Captured once when the docket is first classified and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: DocketId,
    pub case_name: String,
    pub docket_number: String,
    pub court: String,
    pub filing_date: String,
    pub url: String,
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub nature_of_suit: String,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub entities: Vec<String>,
}

impl CaseRecord {
    pub fn snapshot(docket: &DocketRecord, entities: &[String]) -> Self {
        Self {
            id: docket.id,
            case_name: docket.case_name.clone(),
            docket_number: docket.docket_number.clone(),
            court: docket.court_id.clone(),
            filing_date: docket.date_filed.clone(),
            url: docket.public_url(),
            jurisdiction: docket.jurisdiction_type.clone().unwrap_or_default(),
            nature_of_suit: docket.nature_of_suit.clone().unwrap_or_default(),
            cause: docket.cause.clone().unwrap_or_default(),
            entities: entities.to_vec(),
        }
    }
}

/// Persisted verdict for one docket. At most one per docket ID, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub docket_id: DocketId,
    /// Matched entity IDs in watch-list order. Empty is a final verdict.
    pub matched_entity_ids: Vec<String>,
    pub last_checked_at: DateTime<Utc>,
    pub case_snapshot: CaseRecord,
}

impl ClassificationResult {
    pub fn new(docket: &DocketRecord, matched_entity_ids: Vec<String>, now: DateTime<Utc>) -> Self {
        let case_snapshot = CaseRecord::snapshot(docket, &matched_entity_ids);
        Self {
            docket_id: docket.id,
            matched_entity_ids,
            last_checked_at: now,
            case_snapshot,
        }
    }

    pub fn is_match(&self) -> bool {
        !self.matched_entity_ids.is_empty()
    }
}

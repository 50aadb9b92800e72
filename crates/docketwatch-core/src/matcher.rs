//! Entity matching for docket records.
//!
//! Decides which watch-list entities a docket relates to. Pure and
//! deterministic: the same docket and watch-list always yield the same set.
//!
//! # Signals
//!
//! Each entity is checked independently, first hit wins:
//!
//! 1. A keyword appears in `case_name`.
//! 2. A keyword appears in `case_name_short`, then `case_name_full`.
//! 3. Government entities only: `jurisdiction_type` contains the literal
//!    "U.S. Government" and either the cause of action or the nature of suit
//!    mentions administrative / agency / government activity.
//!
//! Keyword and term comparisons are case-insensitive. Keywords are otherwise
//! used exactly as written, surrounding spaces included, so `" DOGE "` only
//! matches the standalone word. Blank keywords are ignored. The jurisdiction
//! literal is compared as-is.

use tracing::debug;

use crate::docket::DocketRecord;
use crate::watchlist::{Entity, WatchList};

const GOVERNMENT_JURISDICTION: &str = "U.S. Government";
const CAUSE_TERMS: &[&str] = &["administrative", "agency", "government"];
const NATURE_OF_SUIT_TERMS: &[&str] = &["administrative", "agency action", "government"];

/// Which signal matched a docket to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSignal {
    CaseName,
    CaseNameVariant,
    GovernmentHeuristic,
}

/// Matched entity IDs for a docket, in watch-list order. Empty means no match.
pub fn classify(docket: &DocketRecord, watchlist: &WatchList) -> Vec<String> {
    watchlist
        .entities()
        .iter()
        .filter_map(|entity| {
            let signal = match_entity(docket, entity)?;
            debug!(
                docket_id = docket.id,
                entity = %entity.id,
                ?signal,
                "docket matched entity"
            );
            Some(entity.id.clone())
        })
        .collect()
}

/// The first signal that ties `docket` to `entity`, if any.
pub fn match_entity(docket: &DocketRecord, entity: &Entity) -> Option<MatchSignal> {
    let keywords: Vec<String> = entity
        .keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .map(|k| k.to_lowercase())
        .collect();

    if contains_any(&docket.case_name, keywords.as_slice()) {
        return Some(MatchSignal::CaseName);
    }

    let variants = [&docket.case_name_short, &docket.case_name_full];
    if variants
        .into_iter()
        .flatten()
        .any(|name| contains_any(name, keywords.as_slice()))
    {
        return Some(MatchSignal::CaseNameVariant);
    }

    if entity.is_government_entity && government_heuristic(docket) {
        return Some(MatchSignal::GovernmentHeuristic);
    }

    None
}

fn government_heuristic(docket: &DocketRecord) -> bool {
    let in_government_jurisdiction = docket
        .jurisdiction_type
        .as_deref()
        .is_some_and(|j| j.contains(GOVERNMENT_JURISDICTION));
    if !in_government_jurisdiction {
        return false;
    }

    let cause_hit = docket
        .cause
        .as_deref()
        .is_some_and(|c| contains_any(c, CAUSE_TERMS));
    let suit_hit = docket
        .nature_of_suit
        .as_deref()
        .is_some_and(|s| contains_any(s, NATURE_OF_SUIT_TERMS));
    cause_hit || suit_hit
}

/// Case-insensitive substring test. `needles` must already be lowercase.
fn contains_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(n.as_ref()))
}

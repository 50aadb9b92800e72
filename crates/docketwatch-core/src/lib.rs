pub mod docket;
pub mod matcher;
pub mod watchlist;

pub use docket::{
    COURTLISTENER_ORIGIN, CaseRecord, ClassificationResult, DocketId, DocketRecord,
    MalformedDocket,
};
pub use matcher::{MatchSignal, classify, match_entity};
pub use watchlist::{Entity, WatchList, WatchlistError};

//! Upstream sync: fetching docket pages from the CourtListener REST API.

pub mod http;

pub use http::{ClientConfig, CourtListenerClient, DEFAULT_BASE_URL, DocketSource, UpstreamError};

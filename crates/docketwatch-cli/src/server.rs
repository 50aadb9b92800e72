//! HTTP surface: case list read path and the guarded webhook trigger.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use docketwatch_core::CaseRecord;
use docketwatch_host::Service;
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tracing::{error, warn};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// Source addresses permitted to call guarded routes.
#[derive(Debug, Clone)]
pub struct AllowList {
    ips: Vec<IpAddr>,
}

impl AllowList {
    pub fn new(ips: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            ips: ips.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        self.ips.contains(&ip.to_canonical())
    }
}

/// Cross-origin policy for browser callers. No origins means any origin.
pub fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            HeaderName::from_static("idempotency-key"),
        ]));
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

/// Build the application router.
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`
/// so the webhook guard can see the caller's address.
pub fn router(service: Arc<Service>, allow: AllowList, cors: CorsLayer) -> Router {
    let webhook = Router::new()
        .route("/webhook", post(webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(allow),
            allow_list_guard,
        ));

    Router::new()
        .route("/", get(index_handler))
        .route("/cases", get(cases_handler))
        .merge(webhook)
        .layer(cors)
        .with_state(service)
}

async fn allow_list_guard(
    State(allow): State<Arc<AllowList>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !allow.permits(peer.ip()) {
        warn!(peer = %peer.ip(), path = %request.uri().path(), "rejected caller not on allow-list");
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(request).await
}

async fn webhook_handler(
    State(service): State<Arc<Service>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(key) = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    else {
        return (StatusCode::BAD_REQUEST, "missing Idempotency-Key header").into_response();
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("invalid JSON payload: {e}")).into_response();
        }
    };

    let outcome = service.handle_webhook_event(key, &payload);
    Json(json!({ "outcome": outcome.as_str() })).into_response()
}

async fn cases_handler(State(service): State<Arc<Service>>) -> Json<Vec<CaseRecord>> {
    Json(service.get_cases().to_vec())
}

async fn index_handler(State(service): State<Arc<Service>>) -> Response {
    match render_index(&service.get_cases()) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render case list");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn render_index(cases: &[CaseRecord]) -> Result<String, tera::Error> {
    let mut context = tera::Context::new();
    context.insert("cases", cases);
    tera::Tera::one_off(INDEX_TEMPLATE, &context, true)
}

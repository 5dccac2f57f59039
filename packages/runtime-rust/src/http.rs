//! Read-only HTTP endpoint serving compiled editor configurations.
//!
//! Routes:
//! - `GET /health` -- readiness and editor count
//! - `GET /editors` -- navigation summary of every editor
//! - `GET /editors/{*root_path}` -- full configuration of one editor

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use panelgen_core::EditorConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::HttpConfig;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Compiled editors keyed by root path.
    pub editors: Arc<BTreeMap<String, EditorConfig>>,
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(editors: BTreeMap<String, EditorConfig>) -> Self {
        Self {
            editors: Arc::new(editors),
            start_time: Instant::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "state": "ready",
        "editors": state.editors.len(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Navigation entries, ordered by root path.
pub async fn list_editors_handler(State(state): State<AppState>) -> Json<Value> {
    let entries: Vec<Value> = state
        .editors
        .values()
        .map(|editor| {
            json!({
                "rootPath": editor.root_path,
                "name": editor.name,
                "collection": editor.collection,
                "group": editor.group,
                "icon": editor.icon,
                "order": editor.order,
            })
        })
        .collect();
    Json(Value::Array(entries))
}

/// Looks up an editor by root path. The leading `/` is implied by the route.
///
/// # Errors
///
/// Returns 404 with a JSON body when no editor is mounted at the path.
pub async fn get_editor_handler(
    State(state): State<AppState>,
    Path(root_path): Path<String>,
) -> Result<Json<EditorConfig>, (StatusCode, Json<Value>)> {
    let key = format!("/{}", root_path.trim_start_matches('/'));
    state.editors.get(&key).cloned().map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no editor at {key}") })),
        )
    })
}

// ---------------------------------------------------------------------------
// Router and server
// ---------------------------------------------------------------------------

/// Builds the router with tracing, CORS, and timeout layers applied.
#[must_use]
pub fn build_router(editors: BTreeMap<String, EditorConfig>, config: &HttpConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/editors", get(list_editors_handler))
        .route("/editors/{*root_path}", get(get_editor_handler))
        .with_state(AppState::new(editors))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// A wildcard `"*"` allows any origin; otherwise only the parseable entries.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

/// Binds the configured address. Port 0 picks a free port.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn bind(config: &HttpConfig) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local = listener.local_addr()?;
    info!("TCP listener bound to {local}");
    Ok(listener)
}

/// Serves `router` until `shutdown` resolves, then drains open requests.
///
/// # Errors
///
/// Returns an error if the server hits a fatal I/O error.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("serving editor configurations");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use panelgen_core::SchemaCatalog;
    use tower::ServiceExt;

    fn editors() -> BTreeMap<String, EditorConfig> {
        SchemaCatalog::from_value(json!({
            "posts": {
                "fields": [ { "name": "title", "type": "string" } ],
                "editor": { "icon": "article", "group": "content" },
                "variants": { "drafts": { "filter": { "draft": true } } }
            },
            "tags": { "fields": [ { "name": "name", "type": "string" } ] }
        }))
        .unwrap()
        .compile_all()
    }

    #[tokio::test]
    async fn health_reports_editor_count() {
        let state = AppState::new(editors());
        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["editors"], 3);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn list_is_ordered_by_root_path() {
        let state = AppState::new(editors());
        let json = list_editors_handler(State(state)).await.0;
        let paths: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["rootPath"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["/posts", "/posts/drafts", "/tags"]);
        assert_eq!(json[0]["icon"], "article");
    }

    #[tokio::test]
    async fn get_editor_by_path_or_404() {
        let state = AppState::new(editors());
        let Json(editor) = get_editor_handler(State(state.clone()), Path("posts/drafts".into()))
            .await
            .unwrap();
        assert_eq!(editor.root_path, "/posts/drafts");
        assert_eq!(editor.filter["draft"], true);

        let (status, body) = get_editor_handler(State(state), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0["error"], "no editor at /missing");
    }

    #[tokio::test]
    async fn router_serves_editor_json() {
        let router = build_router(editors(), &HttpConfig::default());
        let response = router
            .oneshot(Request::builder().uri("/editors/tags").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["collection"], "tags");
        assert_eq!(json["rootPath"], "/tags");
    }

    #[tokio::test]
    async fn router_unknown_route_is_404() {
        let router = build_router(editors(), &HttpConfig::default());
        let response = router
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_layer_accepts_explicit_origins() {
        let _any = build_cors_layer(&["*".to_string()]);
        let _list = build_cors_layer(&["http://localhost:3000".to_string()]);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let config = HttpConfig {
            host: "127.0.0.1".into(),
            ..HttpConfig::default()
        };
        let listener = bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, build_router(editors(), &config), async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}

//! Tripsheet Dev Server
//!
//! A local stand-in for the shopping write endpoint and the spreadsheet CSV
//! export, so the CLI can be run end to end without the hosted services.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TRIPSHEET_DEV_PORT`: Port to listen on (default: 8787)
//! - `TRIPSHEET_DEV_SHEETS`: Directory of `<gid>.csv` files served as sheet
//!   tabs (default: `./sheets`)
//! - `TRIPSHEET_DEV_SHOPPING_GID`: Tab id the shopping list is served under
//!   (default: `shopping`)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check
//! - `POST /write`: Apply a shopping write (`{ operation, item?, itemId? }`)
//! - `GET /spreadsheets/d/{sheet_id}/export?format=csv&gid=<gid>`: CSV export
//! - `POST /admin/failures?enabled=true|false`: Make writes fail with 503

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripsheet_core::sync::{SyncOperation, WriteRequest, WriteResponse};
use tripsheet_core::ShoppingItem;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
struct Config {
    port: u16,
    sheets_dir: PathBuf,
    shopping_gid: String,
}

impl Config {
    fn from_env() -> Self {
        let port = std::env::var("TRIPSHEET_DEV_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8787);

        let sheets_dir = std::env::var("TRIPSHEET_DEV_SHEETS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("sheets"));

        let shopping_gid =
            std::env::var("TRIPSHEET_DEV_SHOPPING_GID").unwrap_or_else(|_| "shopping".to_string());

        Self {
            port,
            sheets_dir,
            shopping_gid,
        }
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Default)]
struct ShoppingTable {
    items: BTreeMap<String, ShoppingItem>,
    failing: bool,
}

#[derive(Clone)]
struct AppState {
    shopping: Arc<Mutex<ShoppingTable>>,
    sheets_dir: PathBuf,
    shopping_gid: String,
}

impl AppState {
    fn new(sheets_dir: PathBuf, shopping_gid: String) -> Self {
        Self {
            shopping: Arc::new(Mutex::new(ShoppingTable::default())),
            sheets_dir,
            shopping_gid,
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, ShoppingTable> {
        self.shopping
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn reply(status: StatusCode, success: bool, message: impl Into<String>) -> Response {
    (
        status,
        Json(WriteResponse {
            success,
            message: message.into(),
            data: None,
        }),
    )
        .into_response()
}

async fn write(State(state): State<AppState>, Json(request): Json<WriteRequest>) -> Response {
    let mut table = state.table();
    if table.failing {
        tracing::info!("Failing {} on request", request.operation);
        return reply(StatusCode::SERVICE_UNAVAILABLE, false, "failure injection enabled");
    }

    match request.operation {
        SyncOperation::Create => {
            let Some(patch) = request.item else {
                return reply(StatusCode::BAD_REQUEST, false, "CREATE needs an item");
            };
            let (Some(id), Some(itinerary_id), Some(name)) = (
                patch.id.clone(),
                patch.itinerary_item_id.clone(),
                patch.name.clone(),
            ) else {
                return reply(
                    StatusCode::BAD_REQUEST,
                    false,
                    "item needs id, itineraryItemId and itemName",
                );
            };

            let created_by = patch.created_by.clone().unwrap_or_else(|| "user".to_string());
            let created_at = patch.created_at.unwrap_or_else(Utc::now);
            let mut item = ShoppingItem::new(id.clone(), itinerary_id, name, created_by, created_at);
            patch.apply_to(&mut item);
            if let Some(at) = patch.last_updated_at {
                item.last_updated_at = at;
            }
            tracing::info!("Created {} ({})", item.name, id);
            table.items.insert(id, item);
            reply(StatusCode::OK, true, "created")
        }

        SyncOperation::Update => {
            let (Some(id), Some(patch)) = (request.item_id, request.item) else {
                return reply(StatusCode::BAD_REQUEST, false, "UPDATE needs itemId and item");
            };
            let Some(item) = table.items.get_mut(&id) else {
                return reply(StatusCode::NOT_FOUND, false, format!("no item {}", id));
            };
            patch.apply_to(item);
            item.last_updated_by = patch.last_updated_by.or(item.last_updated_by.take());
            item.last_updated_at = patch.last_updated_at.unwrap_or_else(Utc::now);
            tracing::info!("Updated {}", id);
            reply(StatusCode::OK, true, "updated")
        }

        SyncOperation::Delete => {
            let Some(id) = request.item_id else {
                return reply(StatusCode::BAD_REQUEST, false, "DELETE needs itemId");
            };
            // Deleting twice is fine; a replayed queue may do it.
            let existed = table.items.remove(&id).is_some();
            tracing::info!("Deleted {} (existed: {})", id, existed);
            reply(StatusCode::OK, true, "deleted")
        }
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    gid: String,
}

async fn export(
    State(state): State<AppState>,
    Path(sheet_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response {
    tracing::debug!("Export of sheet {} tab {}", sheet_id, query.gid);

    let body = if query.gid == state.shopping_gid {
        let items: Vec<ShoppingItem> = state.table().items.values().cloned().collect();
        match shopping_csv(&items) {
            Ok(csv) => csv,
            Err(e) => {
                tracing::error!("Failed to render shopping CSV: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        let valid_gid = query.gid.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_gid {
            return StatusCode::BAD_REQUEST.into_response();
        }
        let path = state.sheets_dir.join(format!("{}.csv", query.gid));
        match tokio::fs::read_to_string(&path).await {
            Ok(csv) => csv,
            Err(e) => {
                tracing::warn!("No sheet at {}: {}", path.display(), e);
                return StatusCode::NOT_FOUND.into_response();
            }
        }
    };

    ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response()
}

/// Renders the shopping table the way the sheet exports it.
fn shopping_csv(items: &[ShoppingItem]) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "itineraryItemId",
        "itemName",
        "isCompleted",
        "quantity",
        "unit",
        "estimatedAmount",
        "currency",
        "notes",
        "createdBy",
        "createdAt",
        "lastUpdatedBy",
        "lastUpdatedAt",
    ])?;

    for item in items {
        writer.write_record([
            item.id.clone(),
            item.itinerary_item_id.clone(),
            item.name.clone(),
            item.is_completed.to_string(),
            item.quantity.map(|q| q.to_string()).unwrap_or_default(),
            item.unit.clone().unwrap_or_default(),
            item.estimated_amount
                .map(|a| a.to_string())
                .unwrap_or_default(),
            item.currency.clone(),
            item.note.clone().unwrap_or_default(),
            item.created_by.clone(),
            item.created_at.to_rfc3339(),
            item.last_updated_by.clone().unwrap_or_default(),
            item.last_updated_at.to_rfc3339(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

#[derive(Deserialize)]
struct FailureQuery {
    enabled: bool,
}

async fn set_failures(State(state): State<AppState>, Query(query): Query<FailureQuery>) -> StatusCode {
    state.table().failing = query.enabled;
    tracing::info!("Write failure injection: {}", query.enabled);
    StatusCode::NO_CONTENT
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/write", post(write))
        .route("/spreadsheets/d/{sheet_id}/export", get(export))
        .route("/admin/failures", post(set_failures))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripsheet_devserver=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Serving sheet tabs from {}", config.sheets_dir.display());
    tracing::info!("Shopping list served as tab {}", config.shopping_gid);

    let state = AppState::new(config.sheets_dir, config.shopping_gid);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Starting dev server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

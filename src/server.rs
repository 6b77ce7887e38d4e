//! HTTP surface for the review UI.

use crate::config::{load_config, resolve_bind};
use crate::db::open_db;
use crate::export::{
    ERROR_ANALYSIS_FILENAME, TRACES_FILENAME, write_error_analysis_csv, write_traces_csv,
};
use crate::render;
use crate::store::{ErrorAggregator, SqliteTraceStore, TraceStore};
use crate::view::{DetailPage, FormValues, ListPage, Panels};
use crate::TraceError;
use axum::{
    Form, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use log::{error, info, warn};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TraceStore>,
    pub aggregator: Arc<dyn ErrorAggregator>,
    pub taxonomy: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TraceStore>,
        aggregator: Arc<dyn ErrorAggregator>,
        taxonomy: Vec<String>,
    ) -> Self {
        Self {
            store,
            aggregator,
            taxonomy: Arc::new(taxonomy),
        }
    }

    /// One SQLite store serving both collaborator roles.
    pub fn from_sqlite(store: SqliteTraceStore, taxonomy: Vec<String>) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store, taxonomy)
    }
}

pub enum PageError {
    NotFound(i64),
    Store(TraceError),
}

impl From<TraceError> for PageError {
    fn from(e: TraceError) -> Self {
        PageError::Store(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::NotFound(id) => {
                (StatusCode::NOT_FOUND, Html(render::not_found_page(id))).into_response()
            }
            PageError::Store(e) => {
                error!("store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(render::error_page(&e.to_string())),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnnotationForm {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub failure_modes: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/traces", get(list_traces))
        .route("/traces/export", get(export_traces))
        .route("/traces/export_error_analysis", get(export_error_analysis))
        .route("/traces/:id", get(show_trace).post(save_trace))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    info!(
        "{method} {path} -> {} ({:.1?})",
        response.status().as_u16(),
        start.elapsed()
    );
    response
}

async fn index() -> Redirect {
    Redirect::to("/traces")
}

async fn list_traces(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let panels = Panels::load(state.store.as_ref(), state.aggregator.as_ref(), None)?;
    Ok(Html(render::list_page(&ListPage { panels })))
}

async fn show_trace(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let page = DetailPage::load(
        state.store.as_ref(),
        state.aggregator.as_ref(),
        id,
        &state.taxonomy,
    )?
    .ok_or(PageError::NotFound(id))?;
    Ok(Html(render::detail_page(&page)))
}

async fn save_trace(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<AnnotationForm>,
) -> Result<Response, PageError> {
    match state.store.update_trace(id, &form.notes, &form.failure_modes) {
        Ok(true) => {
            info!("saved annotations for trace {id}");
            Ok(Redirect::to(&format!("/traces/{id}")).into_response())
        }
        Ok(false) => Err(PageError::NotFound(id)),
        Err(e) => {
            warn!("save failed for trace {id}: {e}");
            let submitted = FormValues {
                notes: form.notes,
                failure_modes: form.failure_modes,
            };
            Ok(save_failed_response(&state, id, submitted, e.to_string()))
        }
    }
}

/// Re-render the detail page around the submitted values. If the trace can't
/// be read either, fall back to a bare form so the text is still recoverable.
fn save_failed_response(state: &AppState, id: i64, submitted: FormValues, message: String) -> Response {
    let page = DetailPage::load(
        state.store.as_ref(),
        state.aggregator.as_ref(),
        id,
        &state.taxonomy,
    );
    let html = match page {
        Ok(Some(page)) => render::detail_page(&page.with_save_error(submitted, message)),
        Ok(None) => return PageError::NotFound(id).into_response(),
        Err(e) => {
            warn!("reload after failed save of trace {id} also failed: {e}");
            render::save_failed_page(id, &submitted, &message)
        }
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response()
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_traces(State(state): State<AppState>) -> Result<Response, PageError> {
    let traces = state.store.all_traces()?;
    let mut body = Vec::new();
    write_traces_csv(&traces, &mut body)?;
    Ok(csv_response(TRACES_FILENAME, body))
}

async fn export_error_analysis(State(state): State<AppState>) -> Result<Response, PageError> {
    let traces = state.store.all_traces()?;
    let mut body = Vec::new();
    write_error_analysis_csv(&traces, &mut body)?;
    Ok(csv_response(ERROR_ANALYSIS_FILENAME, body))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), TraceError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("trace review UI listening on http://{addr}/traces");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn handle_serve(db_path: &std::path::Path, bind: Option<&str>) -> Result<(), TraceError> {
    let config = load_config()?;
    let addr = resolve_bind(&config, bind)?;
    let store = SqliteTraceStore::new(open_db(db_path)?);
    info!("using database {}", db_path.display());
    let state = AppState::from_sqlite(store, config.taxonomy.labels);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(addr, state))
}

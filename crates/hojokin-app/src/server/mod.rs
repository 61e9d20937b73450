//! Web front end: search form, search and detail JSON endpoints.

mod shutdown;
pub mod ui;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Extension, Form, Json, Router,
    body::Body,
    extract::{MatchedPath, Path},
    http::{Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::Span;

use crate::config::AppConfig;
use crate::jgrants::{JGrantsClient, JGrantsError, SearchQuery, SortField, SortOrder};
use crate::services::{
    LOCAL_ID_PREFIX, LocalDataError, LocalSubsidySearcher, SubsidyDetailView, SubsidySummary,
};

use self::shutdown::ShutdownSignal;

const INDEX_PATH: &str = "/";
const SEARCH_PATH: &str = "/search";
const DETAIL_PATH: &str = "/detail/{id}";
const RELOAD_PATH: &str = "/v1/local/reload";
const HEALTHZ_PATH: &str = "/v1/healthz";
const MIN_KEYWORD_CHARS: usize = 2;
const KEYWORD_TOO_SHORT: &str = "検索キーワードは2文字以上で入力してください";

/// Shared handler state: the API client and the reloadable local index.
#[derive(Debug)]
pub struct AppState {
    jgrants: JGrantsClient,
    local: RwLock<LocalSubsidySearcher>,
}

pub type AppStateHandle = Arc<AppState>;

impl AppState {
    pub fn new(jgrants: JGrantsClient, local: LocalSubsidySearcher) -> AppStateHandle {
        Arc::new(Self {
            jgrants,
            local: RwLock::new(local),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<AppStateHandle, ServerError> {
        let jgrants = JGrantsClient::new(&config.jgrants.base_url, config.jgrants.timeout())?;
        let local = LocalSubsidySearcher::load(&config.storage.data_dir)?;
        tracing::info!(
            data_dir = %config.storage.data_dir.display(),
            records = local.len(),
            "local subsidy index loaded"
        );
        Ok(Self::new(jgrants, local))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchForm {
    keyword: String,
    sort: Option<String>,
    order: Option<String>,
    acceptance_only: Option<String>,
    target_area: Option<String>,
    target_number_of_employees: Option<String>,
    use_purpose: Option<String>,
}

impl SearchForm {
    fn into_query(self) -> Result<SearchQuery, ApiError> {
        let keyword = self.keyword.trim().to_string();
        if keyword.chars().count() < MIN_KEYWORD_CHARS {
            return Err(ApiError::invalid_param("keyword", KEYWORD_TOO_SHORT));
        }

        let sort = match non_blank(self.sort) {
            Some(raw) => raw
                .parse::<SortField>()
                .map_err(|msg| ApiError::invalid_param("sort", msg))?,
            None => SortField::default(),
        };
        let order = match non_blank(self.order) {
            Some(raw) => raw
                .parse::<SortOrder>()
                .map_err(|msg| ApiError::invalid_param("order", msg))?,
            None => SortOrder::default(),
        };

        Ok(SearchQuery::builder()
            .keyword(keyword)
            .sort(sort)
            .order(order)
            .acceptance_only(self.acceptance_only.as_deref() == Some("on"))
            .maybe_target_area(non_blank(self.target_area))
            .maybe_target_number_of_employees(non_blank(self.target_number_of_employees))
            .maybe_use_purpose(non_blank(self.use_purpose))
            .build())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    count: u64,
    subsidies: Vec<SubsidySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct DetailResponse {
    success: bool,
    subsidy: SubsidyDetailView,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    success: bool,
    count: usize,
}

/// Machine-readable `code` of an error body.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ErrorCode {
    InvalidParameter,
    NotFound,
    MethodNotAllowed,
    UpstreamError,
    InternalServerError,
}

/// JSON error reply: `{success: false, error, code, field?}`.
#[derive(Debug, Clone)]
struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
    field: Option<&'static str>,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            field: None,
        }
    }

    fn on_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    fn invalid_param(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::InvalidParameter, message).on_field(field)
    }

    fn unknown_subsidy(id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("subsidy `{id}` not found"),
        )
        .on_field("id")
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalServerError,
            message,
        )
    }
}

impl From<JGrantsError> for ApiError {
    fn from(error: JGrantsError) -> Self {
        if matches!(error, JGrantsError::InvalidId { .. }) {
            return Self::invalid_param("id", error.to_string());
        }
        tracing::error!(%error, "JGrants request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UpstreamError,
            error.to_string(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.message,
            "code": self.code,
        });
        if let Some(field) = self.field {
            body["field"] = Value::from(field);
        }
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server.listen_addr is empty")]
    EmptyListenAddr,
    #[error("cannot parse listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listener has no local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("http server failed: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    JGrants(#[from] JGrantsError),
    #[error(transparent)]
    LocalData(#[from] LocalDataError),
}

/// Routes with state attached; `serve` adds request tracing on top.
pub fn build_api_router(state: AppStateHandle) -> Router {
    debug_assert!(DETAIL_PATH.ends_with("{id}"));

    Router::new()
        .route(INDEX_PATH, get(ui::index).fallback(wrong_method))
        .route(SEARCH_PATH, post(search).fallback(wrong_method))
        .route(DETAIL_PATH, get(subsidy_detail).fallback(wrong_method))
        .route(RELOAD_PATH, post(reload_local).fallback(wrong_method))
        .route(HEALTHZ_PATH, get(healthz).fallback(wrong_method))
        .fallback(no_route)
        .layer(Extension(state))
}

/// Binds `server.listen_addr` and serves until Ctrl+C or SIGTERM plus the drain window.
pub async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let listen_addr = parse_listen_addr(&config.server.listen_addr)?;
    let state = AppState::from_config(&config)?;

    let listener = TcpListener::bind(listen_addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: listen_addr.to_string(),
            source,
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    tracing::info!(%local_addr, "hojokin server listening");

    let shutdown = ShutdownSignal::new();
    let app = build_app_router(state);
    let stop = shutdown.triggered();
    let server = async move { axum::serve(listener, app).with_graceful_shutdown(stop).await };

    tokio::select! {
        result = server => result.map_err(|source| ServerError::Serve { source })?,
        () = shutdown.drain_deadline() => {}
    }

    match shutdown.reason() {
        Some(reason) => tracing::info!(?reason, "server stopped"),
        None => tracing::info!("server stopped without a stop signal"),
    }
    Ok(())
}

fn build_app_router(state: AppStateHandle) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map_or(request.uri().path(), MatchedPath::as_str);
            tracing::info_span!("request", method = %request.method(), route)
        })
        .on_response(|response: &Response, latency: Duration, _span: &Span| {
            tracing::info!(
                status = response.status().as_u16(),
                elapsed_ms = millis(latency),
                "response sent"
            );
        })
        .on_failure(
            |class: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                tracing::error!(%class, elapsed_ms = millis(latency), "request failed");
            },
        );

    build_api_router(state).layer(trace)
}

fn millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

async fn search(
    Extension(state): Extension<AppStateHandle>,
    Form(form): Form<SearchForm>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = form.into_query()?;

    let local_rows: Vec<SubsidySummary> = {
        let local = state.local.read().await;
        local
            .search(
                &query.keyword,
                query.target_area.as_deref(),
                query.acceptance_only,
            )
            .into_iter()
            .map(SubsidySummary::from_local)
            .collect()
    };

    match state.jgrants.search_subsidies(&query).await {
        Ok(list) => {
            let count = list.count() + local_rows.len() as u64;
            let mut subsidies: Vec<SubsidySummary> =
                list.result.iter().map(SubsidySummary::from_jgrants).collect();
            subsidies.extend(local_rows);
            Ok(Json(SearchResponse {
                success: true,
                count,
                subsidies,
                warning: None,
            }))
        }
        Err(error) if !local_rows.is_empty() => {
            tracing::warn!(
                %error,
                local = local_rows.len(),
                "JGrants search failed; serving local results only"
            );
            Ok(Json(SearchResponse {
                success: true,
                count: local_rows.len() as u64,
                subsidies: local_rows,
                warning: Some(error.to_string()),
            }))
        }
        Err(error) => Err(ApiError::from(error)),
    }
}

async fn subsidy_detail(
    Extension(state): Extension<AppStateHandle>,
    Path(id): Path<String>,
) -> Result<Json<DetailResponse>, ApiError> {
    if id.starts_with(LOCAL_ID_PREFIX) {
        let local = state.local.read().await;
        let subsidy = local
            .get_by_id(&id)
            .ok_or_else(|| ApiError::unknown_subsidy(&id))?;
        return Ok(Json(DetailResponse {
            success: true,
            subsidy: SubsidyDetailView::from_local(subsidy),
        }));
    }

    let list = state.jgrants.get_subsidy_detail(&id).await?;
    let subsidy = list
        .result
        .first()
        .ok_or_else(|| ApiError::unknown_subsidy(&id))?;
    Ok(Json(DetailResponse {
        success: true,
        subsidy: SubsidyDetailView::from_jgrants(subsidy),
    }))
}

async fn reload_local(
    Extension(state): Extension<AppStateHandle>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let mut local = state.local.write().await;
    let count = local.reload().map_err(|error| {
        tracing::error!(%error, "local index reload failed");
        ApiError::internal(error.to_string())
    })?;
    tracing::info!(count, "local index reloaded");
    Ok(Json(ReloadResponse {
        success: true,
        count,
    }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn wrong_method(method: Method, uri: Uri) -> ApiError {
    ApiError::new(
        StatusCode::METHOD_NOT_ALLOWED,
        ErrorCode::MethodNotAllowed,
        format!("`{method}` is not supported on `{}`", uri.path()),
    )
}

async fn no_route(uri: Uri) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        ErrorCode::NotFound,
        format!("no route for `{}`", uri.path()),
    )
}

fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ServerError> {
    match raw.trim() {
        "" => Err(ServerError::EmptyListenAddr),
        addr => addr
            .parse()
            .map_err(|source| ServerError::InvalidListenAddr {
                address: addr.to_string(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_addr_must_parse() {
        assert!(matches!(
            parse_listen_addr("  "),
            Err(ServerError::EmptyListenAddr)
        ));
        assert!(matches!(
            parse_listen_addr("localhost"),
            Err(ServerError::InvalidListenAddr { .. })
        ));
        assert_eq!(
            parse_listen_addr(" 127.0.0.1:5000 ").unwrap(),
            "127.0.0.1:5000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn short_keywords_are_rejected() {
        let form = SearchForm {
            keyword: " a ".to_string(),
            ..SearchForm::default()
        };
        let err = form.into_query().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, KEYWORD_TOO_SHORT);
        assert_eq!(err.field, Some("keyword"));
    }

    #[test]
    fn form_defaults_map_to_query_defaults() {
        let form = SearchForm {
            keyword: "ＩＴ導入".to_string(),
            acceptance_only: Some("on".to_string()),
            target_area: Some("  ".to_string()),
            use_purpose: Some("設備整備・IT導入をしたい".to_string()),
            ..SearchForm::default()
        };
        let query = form.into_query().unwrap();
        assert_eq!(query.sort, SortField::CreatedDate);
        assert_eq!(query.order, SortOrder::Desc);
        assert!(query.acceptance_only);
        assert_eq!(query.target_area, None);
        assert_eq!(query.use_purpose.as_deref(), Some("設備整備・IT導入をしたい"));
    }

    #[test]
    fn unknown_sort_is_a_parameter_error() {
        let form = SearchForm {
            keyword: "創業".to_string(),
            sort: Some("name".to_string()),
            ..SearchForm::default()
        };
        let err = form.into_query().unwrap_err();
        assert_eq!(err.field, Some("sort"));
    }

    #[test]
    fn error_body_carries_code_and_field() {
        let response = ApiError::invalid_param("order", "bad order").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::unknown_subsidy("local_1");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(
            serde_json::to_value(ErrorCode::InternalServerError).unwrap(),
            json!("internal_server_error")
        );
    }
}

use crate::config::Config;
use crate::container::{MediaContainerResponse, Paging};
use crate::error::AppError;
use crate::library::Library;
use crate::locale::{Locale, DEFAULT_COUNTRY, DEFAULT_LANGUAGE};
use crate::matching::{resolve_match, MatchRequest};
use crate::metadata::{Metadata, RatingKey, PROVIDER_IDENTIFIER, PROVIDER_TITLE};
use crate::tvdb::{TvdbApi, TvdbClient};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
// (header, query parameter) pairs; headers win.
const LANGUAGE_PARAM: (&str, &str) = ("x-plex-language", "X-Plex-Language");
const COUNTRY_PARAM: (&str, &str) = ("x-plex-country", "X-Plex-Country");
const CONTAINER_START: (&str, &str) = ("x-plex-container-start", "X-Plex-Container-Start");
const CONTAINER_SIZE: (&str, &str) = ("x-plex-container-size", "X-Plex-Container-Size");

#[derive(Clone)]
pub struct AppState {
    pub tvdb: Arc<dyn TvdbApi>,
    /// ISO 639-2 code the upstream answers in by default.
    pub upstream_language: String,
}

type QueryParams = Query<HashMap<String, String>>;

pub async fn run_server(config: Config) -> Result<()> {
    let tvdb: Arc<dyn TvdbApi> = Arc::new(TvdbClient::new(&config)?);
    let state = AppState {
        tvdb,
        upstream_language: config.tvdb_language.clone(),
    };

    let app = build_router(state);

    let addr = config.socket_addr();
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(provider_definition))
        .route("/health", get(health))
        .route("/library/metadata/matches", post(match_metadata))
        .route("/library/metadata/:rating_key", get(get_metadata))
        .route("/library/metadata/:rating_key/children", get(get_children))
        .route(
            "/library/metadata/:rating_key/grandchildren",
            get(get_grandchildren),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn provider_definition() -> Json<Value> {
    Json(json!({
        "MediaProvider": {
            "identifier": PROVIDER_IDENTIFIER,
            "title": PROVIDER_TITLE,
            "version": env!("CARGO_PKG_VERSION"),
            "Types": [
                { "type": 2, "Scheme": [{ "scheme": PROVIDER_IDENTIFIER }] },
                { "type": 3, "Scheme": [{ "scheme": PROVIDER_IDENTIFIER }] },
                { "type": 4, "Scheme": [{ "scheme": PROVIDER_IDENTIFIER }] }
            ],
            "Feature": [
                { "type": "metadata", "key": "/library/metadata" },
                { "type": "match", "key": "/library/metadata/matches" }
            ]
        }
    }))
}

async fn match_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): QueryParams,
    body: Bytes,
) -> Result<Json<MediaContainerResponse>, AppError> {
    let request: MatchRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidBody(e.to_string()))?;
    let locale = negotiate_locale(&headers, &query);
    debug!(
        media_type = ?request.media_type,
        title = ?request.title,
        parent_title = ?request.parent_title,
        grandparent_title = ?request.grandparent_title,
        guid = ?request.guid,
        manual = request.manual,
        language = %locale.language,
        "Match request"
    );

    let matches = resolve_match(state.tvdb.as_ref(), &locale, &request).await?;
    debug!(
        matched = ?matches.iter().map(Metadata::rating_key).collect::<Vec<_>>(),
        "Match resolved"
    );
    Ok(Json(MediaContainerResponse::complete(matches)))
}

async fn get_metadata(
    State(state): State<AppState>,
    Path(rating_key): Path<String>,
    headers: HeaderMap,
    Query(query): QueryParams,
) -> Result<Json<MediaContainerResponse>, AppError> {
    let key = parse_rating_key(&rating_key)?;
    let locale = negotiate_locale(&headers, &query);
    let include_children = query
        .get("includeChildren")
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let library = Library::new(state.tvdb.as_ref(), &locale, &state.upstream_language);
    let metadata = library
        .lookup(key, include_children)
        .await?
        .ok_or(AppError::NotFound(rating_key))?;
    Ok(Json(MediaContainerResponse::complete(vec![metadata])))
}

async fn get_children(
    State(state): State<AppState>,
    Path(rating_key): Path<String>,
    headers: HeaderMap,
    Query(query): QueryParams,
) -> Result<Json<MediaContainerResponse>, AppError> {
    let key = parse_rating_key(&rating_key)?;
    let locale = negotiate_locale(&headers, &query);
    let paging = negotiate_paging(&headers, &query);
    let season_type = query.get("episodeOrder").map(String::as_str);

    let library = Library::new(state.tvdb.as_ref(), &locale, &state.upstream_language);
    let listing = library
        .children(key, paging, season_type)
        .await?
        .ok_or(AppError::NotFound(rating_key))?;
    Ok(Json(MediaContainerResponse::page(listing)))
}

async fn get_grandchildren(
    State(state): State<AppState>,
    Path(rating_key): Path<String>,
    headers: HeaderMap,
    Query(query): QueryParams,
) -> Result<Json<MediaContainerResponse>, AppError> {
    let key = parse_rating_key(&rating_key)?;
    let locale = negotiate_locale(&headers, &query);
    let paging = negotiate_paging(&headers, &query);
    let season_type = query.get("episodeOrder").map(String::as_str);

    let library = Library::new(state.tvdb.as_ref(), &locale, &state.upstream_language);
    let listing = library
        .grandchildren(key, paging, season_type)
        .await?
        .ok_or(AppError::NotFound(rating_key))?;
    Ok(Json(MediaContainerResponse::page(listing)))
}

fn parse_rating_key(raw: &str) -> Result<RatingKey, AppError> {
    RatingKey::parse(raw).ok_or_else(|| AppError::UnknownKey(raw.to_string()))
}

fn header_or_query(
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    (header_name, query_name): (&str, &str),
) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            query
                .get(query_name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}

pub fn negotiate_locale(headers: &HeaderMap, query: &HashMap<String, String>) -> Locale {
    let language = header_or_query(headers, query, LANGUAGE_PARAM)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let country = header_or_query(headers, query, COUNTRY_PARAM)
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());
    Locale::new(language, country)
}

pub fn negotiate_paging(headers: &HeaderMap, query: &HashMap<String, String>) -> Paging {
    let start = header_or_query(headers, query, CONTAINER_START);
    let size = header_or_query(headers, query, CONTAINER_SIZE);
    Paging::from_raw(start.as_deref(), size.as_deref())
}

async fn shutdown_signal() {
    let signal = os_signal().await;
    info!(signal, "Stopping provider, draining in-flight requests");
}

/// Resolves with the name of the first termination signal delivered.
/// A handler that cannot be installed never fires.
async fn os_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

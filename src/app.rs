use crate::favorites::{FavoritesStore, FileStorage, LocalFavorites};
use crate::listing::{ListQuery, SimilarColumn, SimilarSort};
use crate::models::MovieId;
use crate::render;
use crate::tmdb::{TmdbApi, TmdbClient};
use crate::views::{self, CatalogView, DetailView, FavoritesView, Notice};
use anyhow::{Context, Result};
use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, Uri},
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use reqwest::Url;
use serde::Deserialize;
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info};

const MAX_BODY_BYTES: usize = 16 * 1024;
const DEFAULT_PORT: u16 = 3146;
const FALLBACK_LOCATION: &str = "/";
// Parameters that only carry the one-shot toast.
const FLASH_PARAMS: [&str; 2] = ["toast", "sync"];

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub favorites: Arc<dyn FavoritesStore>,
}

pub async fn run_server() -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let storage = FileStorage::from_env();
    info!("Favorites stored in {:?}", storage);
    let favorites: Arc<dyn FavoritesStore> = Arc::new(LocalFavorites::new(storage));

    let state = AppState { tmdb, favorites };
    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(catalog))
        .route("/favorites", get(favorites))
        .route("/favorites/toggle", post(toggle_favorite))
        .route("/movie", get(detail))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlashQuery {
    toast: Option<String>,
    sync: Option<String>,
}

impl FlashQuery {
    fn notice(&self) -> Option<Notice> {
        Notice::from_params(self.toast.as_deref(), self.sync.as_deref())
    }
}

async fn catalog(
    State(state): State<AppState>,
    uri: Uri,
    Query(mut query): Query<ListQuery>,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let reset = query.wants_reset();
    query.reset = None;
    let mut view = CatalogView::new(query);
    view.load(state.tmdb.as_ref()).await;
    if reset {
        view.reset();
    }
    let favorites = state.favorites.favorites();
    let return_to = current_location(&uri, reset);
    Html(render::catalog_page(&view, &favorites, &return_to, flash.notice()))
}

async fn favorites(
    State(state): State<AppState>,
    uri: Uri,
    Query(mut query): Query<ListQuery>,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let reset = query.wants_reset();
    query.reset = None;
    let mut view = FavoritesView::new(query);
    view.load(state.tmdb.as_ref(), state.favorites.as_ref()).await;
    if reset {
        view.reset();
    }
    let return_to = current_location(&uri, reset);
    Html(render::favorites_page(&view, &return_to, flash.notice()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailQuery {
    id: Option<String>,
    sort: Option<String>,
    dir: Option<String>,
}

impl DetailQuery {
    fn similar_sort(&self) -> SimilarSort {
        match self.sort.as_deref().and_then(SimilarColumn::parse) {
            Some(column) => SimilarSort::new(column, self.dir.as_deref() != Some("desc")),
            None => SimilarSort::default(),
        }
    }
}

async fn detail(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<DetailQuery>,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let mut view = DetailView::new(query.id.as_deref().map(MovieId::from));
    view.set_sort(query.similar_sort());
    view.load(state.tmdb.as_ref(), state.favorites.as_ref()).await;
    let back = back_location(&headers, &uri);
    let return_to = current_location(&uri, false);
    Html(render::detail_page(&view, &back, &return_to, flash.notice()))
}

#[derive(Debug, Deserialize)]
struct ToggleForm {
    id: String,
    #[serde(default)]
    return_to: String,
}

async fn toggle_favorite(State(state): State<AppState>, Form(form): Form<ToggleForm>) -> Redirect {
    let id = MovieId::from(form.id);
    let target = safe_return_to(&form.return_to);
    if id.is_empty() {
        return Redirect::to(&target);
    }
    let notice = views::toggle_favorite(state.favorites.as_ref(), &id);
    debug!(id = %id, "Favorite toggle -> {}", notice.as_param());
    Redirect::to(&with_notice(&target, notice))
}

pub fn safe_return_to(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('/') && !raw.starts_with("//") && !raw.contains('\\') {
        raw.to_string()
    } else {
        FALLBACK_LOCATION.to_string()
    }
}

fn local_url(path_and_query: &str) -> Option<Url> {
    Url::parse("http://local").ok()?.join(path_and_query).ok()
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(q) if !q.is_empty() => format!("{}?{}", url.path(), q),
        _ => url.path().to_string(),
    }
}

pub fn with_notice(target: &str, notice: Notice) -> String {
    let Some(mut url) = local_url(target) else {
        return FALLBACK_LOCATION.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !FLASH_PARAMS.iter().any(|p| *p == &**k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept);
        pairs.append_pair("toast", notice.as_param());
        if notice.sync == crate::favorites::SyncStatus::Failed {
            pairs.append_pair("sync", "failed");
        }
    }
    path_and_query(&url)
}

fn current_location(uri: &Uri, drop_filters: bool) -> String {
    let raw = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(FALLBACK_LOCATION);
    let Some(mut url) = local_url(raw) else {
        return FALLBACK_LOCATION.to_string();
    };
    if drop_filters {
        url.set_query(None);
        return path_and_query(&url);
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !FLASH_PARAMS.iter().any(|p| *p == &**k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    path_and_query(&url)
}

pub fn back_location(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|r| Url::parse(r).ok());
    let (Some(host), Some(referer)) = (host, referer) else {
        return FALLBACK_LOCATION.to_string();
    };
    let same_origin = match referer.port() {
        Some(port) => referer
            .host_str()
            .is_some_and(|h| host == format!("{h}:{port}")),
        None => referer.host_str() == Some(host),
    };
    if !same_origin {
        return FALLBACK_LOCATION.to_string();
    }
    let previous = path_and_query(&referer);
    let current = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("");
    if previous == current {
        FALLBACK_LOCATION.to_string()
    } else {
        previous
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}

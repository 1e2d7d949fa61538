use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::error::SiteError;
use crate::include::{fill_element, Feature, Site};
use crate::poller::NewsActivation;
use crate::render::NewsClientTemplate;

/// Element the rendered news is written into.
pub const NEWS_CONTAINER_ID: &str = "latest-news-layout";
/// Element receiving the per-page polling and visibility hooks.
pub const NEWS_CLIENT_ID: &str = "latest-news-client";

pub struct AppState {
    pub site: Site,
    pub activation: NewsActivation,
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let root = state.site.root().to_path_buf();

    Router::new()
        .route("/", get(index))
        .route("/:page", get(page))
        .route("/news/latest", get(news_latest))
        .route("/news/refresh", post(news_refresh))
        .route("/news/notification", get(notification))
        .route("/news/notification/dismiss", post(dismiss_notification))
        .route("/news/visibility", post(visibility))
        .route("/health", get(health))
        .route_service("/nyheter.json", ServeFile::new(root.join("nyheter.json")))
        .nest_service("/assets", ServeDir::new(root.join("assets")))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    render_page(&state, "index.html").await
}

pub async fn page(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    render_page(&state, &name).await
}

async fn render_page(state: &AppState, name: &str) -> Result<Response, AppError> {
    let mut page = match state.site.assemble(name).await {
        Ok(page) => page,
        Err(SiteError::NotFound(_) | SiteError::InvalidPage(_)) => {
            return Ok((StatusCode::NOT_FOUND, "Page not found").into_response())
        }
        Err(e) => return Err(e.into()),
    };

    if page.has(Feature::LatestNews) {
        state.activation.ensure_started().await;
        let news = state.activation.news().render().await?;
        fill_element(&mut page.html, NEWS_CONTAINER_ID, &news);

        let client = state.activation.register_client().await;
        let hooks = NewsClientTemplate { client }.render()?;
        fill_element(&mut page.html, NEWS_CLIENT_ID, &hooks);
    }

    Ok(Html(page.html).into_response())
}

pub async fn news_latest(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    state.activation.ensure_started().await;
    Ok(Html(state.activation.news().render().await?))
}

pub async fn news_refresh(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let news = state.activation.news();
    news.refresh().await;
    Ok(Html(news.render().await?))
}

#[derive(Deserialize)]
pub struct ClientQuery {
    pub client: Option<u64>,
}

pub async fn notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClientQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Html(
        state.activation.render_notification(query.client).await?,
    ))
}

/// The toast removes itself client-side; this records the dismissal so the
/// next poll from the same page stays empty.
pub async fn dismiss_notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClientQuery>,
) -> impl IntoResponse {
    if let Some(client) = query.client {
        state.activation.dismiss_notification(client).await;
    }
    Html("")
}

#[derive(Deserialize)]
pub struct VisibilityQuery {
    pub client: u64,
    pub visible: bool,
}

pub async fn visibility(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VisibilityQuery>,
) -> impl IntoResponse {
    state
        .activation
        .set_client_visible(query.client, query.visible)
        .await;
    StatusCode::NO_CONTENT
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

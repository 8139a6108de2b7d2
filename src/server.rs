use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use lazy_static::lazy_static;
use std::sync::Arc;
use tera::{Context, Tera};
use thiserror::Error;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::connection::{DeviceInfo, RouterConnection};
use crate::controller::GuestWifiController;
use crate::error::ConnectionError;
use crate::tr064::Tr064Connection;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_template("index.html", INDEX_TEMPLATE) {
            tracing::error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Router connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Connection(_) => StatusCode::BAD_GATEWAY,
            AppError::Template(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!("{}", self);

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub struct AppState {
    pub settings: Settings,
}

/// Open a fresh router session for one request.
pub async fn connect(
    settings: &Settings,
) -> Result<GuestWifiController<Tr064Connection>, ConnectionError> {
    let connection = Tr064Connection::open(&settings.credentials, settings.request_timeout).await?;
    Ok(GuestWifiController::with_settle_time(
        connection,
        settings.settle_time,
    ))
}

/// Open one session, check the router reports a firmware version, close it.
/// Runs once before the listener is bound.
pub async fn startup_probe(settings: &Settings) -> anyhow::Result<DeviceInfo> {
    tracing::info!(
        "Checking FRITZ!Box connection ({} with user {}) ...",
        settings.credentials.address,
        settings.credentials.user
    );

    let connection = Tr064Connection::open(&settings.credentials, settings.request_timeout).await?;
    let device = connection.device_info().clone();
    connection.close();

    tracing::info!("FRITZ!Box version: {}", device.firmware_version);
    if device.firmware_version.is_empty() {
        anyhow::bail!("Router at {} did not report a firmware version", settings.credentials.address);
    }

    Ok(device)
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/guestwifi", get(info_handler))
        .route("/guestwifi/enable", get(enable_handler))
        .route("/guestwifi/disable", get(disable_handler))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    startup_probe(&settings).await?;

    let addr = format!("{}:{}", settings.bind, settings.port);
    let state = Arc::new(AppState { settings });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Prefix for links on the index page, always ending in `/`.
fn link_prefix(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let controller = connect(&state.settings).await?;
    let status = controller.get_guest_wifi_status().await;
    controller.close();

    let mut context = Context::new();
    context.insert("guestwifi_enabled", &status.enabled.is_enabled());
    context.insert("header_message", &state.settings.header_message);
    context.insert("link_prefix", &link_prefix(&state.settings.base_url));
    context.insert("version", env!("CARGO_PKG_VERSION"));

    Ok(Html(TEMPLATES.render("index.html", &context)?))
}

async fn info_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let controller = connect(&state.settings).await?;
    let info = controller.get_info().await;
    controller.close();

    Ok(Json(serde_json::json!({ "fritzbox": info })))
}

async fn enable_handler(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    switch_guest_wifi(&state, true).await
}

async fn disable_handler(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    switch_guest_wifi(&state, false).await
}

/// The change runs in its own task so a dropped client cannot cut the
/// settle wait and re-read short.
async fn switch_guest_wifi(state: &AppState, enable: bool) -> Result<Redirect, AppError> {
    let controller = connect(&state.settings).await?;

    let result = tokio::spawn(async move {
        let result = controller.set_guest_wifi_status(enable).await;
        controller.close();
        result
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!("Guest WiFi status: {:?}", result.enabled);

    Ok(Redirect::temporary(&state.settings.base_url))
}

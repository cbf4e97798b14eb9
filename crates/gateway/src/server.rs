use std::{net::SocketAddr, sync::Arc};

use {
    anyhow::{Context, bail},
    axum::{
        Json, Router,
        extract::{State, rejection::JsonRejection},
        http::header::HeaderName,
        middleware::from_fn_with_state,
        response::{Html, IntoResponse, Response},
        routing::{get, post},
    },
    secrecy::ExposeSecret,
    serde_json::json,
    tower_http::{sensitive_headers::SetSensitiveRequestHeadersLayer, trace::TraceLayer},
    tracing::{debug, info, warn},
    venom_channels::lifecycle_channel,
    venom_config::VenomConfig,
    venom_protocol::API_KEY_HEADER,
    venom_whatsapp::{BridgeClient, RecoveryPolicy, SendRequest, SessionManager, SessionState},
};

use crate::{
    auth::require_api_key, error::ApiError, state::GatewayState, throttle::throttle_requests,
};

const BANNER: &str = "Venom Lite API is running...";
const QR_PENDING: &str = "QR code not available yet. Please wait...";

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
///
/// Every route sits behind the throttle and then the API key check.
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/qr", get(qr_handler))
        .route("/info", get(info_handler))
        .route("/status", get(status_handler))
        .route("/debug", get(debug_handler))
        .route("/send", post(send_handler))
        .layer(from_fn_with_state(Arc::clone(&state.auth), require_api_key))
        .layer(from_fn_with_state(
            Arc::clone(&state.throttle),
            throttle_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new([HeaderName::from_static(
            API_KEY_HEADER,
        )]))
        .with_state(state)
}

/// Start the session and serve HTTP until Ctrl-C.
pub async fn start_gateway(config: VenomConfig) -> anyhow::Result<()> {
    let Some(api_key) = config.server.api_key.clone() else {
        bail!("no API key configured; set API_KEY or server.api_key");
    };
    if api_key.expose_secret().is_empty() {
        bail!("API key must not be empty");
    }
    config.throttle.validate()?;

    let (events_tx, events_rx) = lifecycle_channel();
    let client = Arc::new(BridgeClient::new(config.bridge.clone(), events_tx.clone()));
    let session = SessionManager::new(client, events_tx, RecoveryPolicy::from(&config.session));

    let state = GatewayState::new(Arc::clone(&session), api_key, &config);
    let app = build_gateway_app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    let addr = listener.local_addr()?;

    // Startup banner.
    let lines = [
        format!("venom gateway v{}", state.version),
        format!("listening on http://{addr}"),
        format!(
            "throttle: {} requests / {}s per address",
            state.throttle.max_requests(),
            state.throttle.window().as_secs()
        ),
        format!(
            "bridge: {} {}",
            config.bridge.command,
            config.bridge.args.join(" ")
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    session.start(events_rx);
    let reaper = state.throttle.spawn_reaper();

    // Run the server with ConnectInfo for per-address throttling.
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    reaper.abort();
    session.shutdown().await;
    info!("gateway stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler() -> &'static str {
    BANNER
}

async fn qr_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match state.session.pairing_code().await {
        Some(code) => Html(pairing_page(&state.pairing_image_url, &code.value)).into_response(),
        None => QR_PENDING.into_response(),
    }
}

async fn info_handler(State(state): State<Arc<GatewayState>>) -> Result<Response, ApiError> {
    let info = state.session.account_info().await?;
    Ok(Json(json!({ "status": true, "data": info })).into_response())
}

async fn status_handler(State(state): State<Arc<GatewayState>>) -> Result<Response, ApiError> {
    if state.session.state().await != SessionState::Ready {
        return Err(ApiError::NotReady);
    }
    Ok(Json(json!({ "status": true, "message": "connected" })).into_response())
}

async fn debug_handler(State(state): State<Arc<GatewayState>>) -> Result<Response, ApiError> {
    let status = state.session.status().await;
    let info = state.session.account_info().await?;
    Ok(Json(json!({
        "status": true,
        "clientReady": status.ready,
        "disconnected": status.disconnected,
        "state": status.state,
        "lastError": status.last_error,
        "pushname": info.pushname,
        "wid": info.wid,
        "platform": info.platform,
    }))
    .into_response())
}

async fn send_handler(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        debug!(error = %rejection, "rejected send body");
        ApiError::Validation(rejection.body_text())
    })?;
    let sent = state.dispatcher.dispatch(request).await?;
    Ok(Json(json!({
        "status": true,
        "message": "sent",
        "sendResult": sent.receipt,
    }))
    .into_response())
}

// ── Pairing page ─────────────────────────────────────────────────────────────

fn pairing_page(image_service: &str, code: &str) -> String {
    let src = format!(
        "{image_service}?data={}&size=300x300",
        urlencoding::encode(code)
    );
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Scan QR</title></head>
  <body style="text-align: center; font-family: Arial, sans-serif;">
    <h2>Scan this QR code to link WhatsApp</h2>
    <img src="{src}" alt="QR Code" data-code="{code}" />
    <p>Reload this page if the QR code has expired.</p>
  </body>
</html>
"#,
        src = escape_html(&src),
        code = escape_html(code),
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

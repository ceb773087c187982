use crate::models::chat::ChatRequest;
use crate::models::stream::StreamPart;
use crate::relay::Relay;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::post,
    Router,
    Json,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response, sse::{ Event, Sse } },
    http::StatusCode,
};
use futures::StreamExt;
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
}

pub fn router(relay: Arc<Relay>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(AppState { relay })
}

pub async fn serve_http(
    addr: SocketAddr,
    app: Router
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
        e
    })?;
    info!("Relay listening on: http://{}", addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

pub async fn serve_https(
    addr: SocketAddr,
    app: Router,
    cert_path: &str,
    key_path: &str
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tls_config = axum_server::tls_rustls::RustlsConfig
        ::from_pem_file(cert_path, key_path).await
        .map_err(|e| format!("Failed to load TLS certificate '{}' / key '{}': {}", cert_path, key_path, e))?;

    info!("Relay listening on: https://{}", addr);
    axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn to_event(part: &StreamPart) -> Result<Event, axum::Error> {
    Event::default().event(part.event_name()).json_data(part)
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected chat request: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    info!("Chat request with {} message(s)", request.messages.len());
    match state.relay.stream_reply(&request.messages).await {
        Ok(parts) => Sse::new(parts.map(|part| to_event(&part))).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

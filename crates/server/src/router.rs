use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::state::AppState;
use crate::tenant::{REQUEST_ID_HEADER, USER_ID_HEADER};
use crate::{agents, ai_status, conversations, health, voice};

pub fn router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/api/conversations/{id}", get(conversations::get_conversation))
        .route("/api/conversations/{id}/message", post(conversations::post_message))
        .route("/api/conversations/{id}/status", patch(conversations::update_status))
        .route("/api/ai-status", get(ai_status::ai_status))
        .route("/api/ai-status/test", post(ai_status::test_ai))
        .route("/api/agents/{id}/test", post(agents::test_agent))
        .route("/api/voice-ai/tts/synthesize", post(voice::synthesize))
        .route("/api/voice-ai/tts/test", post(voice::test_tts))
        .route("/api/voice-ai/tts/elevenlabs/voices", get(voice::elevenlabs_voices))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

/// Credentialed CORS needs explicit origin, method and header lists.
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(error) => {
            warn!(
                event_name = "system.server.cors_origin_invalid",
                correlation_id = "bootstrap",
                origin,
                error = %error,
                "ignoring unparseable CORS origin"
            );
            layer
        }
    }
}

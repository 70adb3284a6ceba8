use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use shopmate_core::domain::advice::AdviceEvent;

use crate::bootstrap::Application;

#[derive(Debug, Deserialize)]
pub struct AdviceRequest {
    pub query: String,
}

/// POST /api/advice: one query in, a server-sent event stream out. The
/// stream always ends with a `final` or `error` event.
pub async fn advise(State(app): State<Application>, Json(body): Json<AdviceRequest>) -> Response {
    let query = body.query.trim().to_owned();
    if too_short(&query) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "query must be at least 3 characters" })),
        )
            .into_response();
    }
    info!(query = %query, "advice.request");

    let rx = app.advisor.advise_stream(query);
    Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()).into_response()
}

// Counts code points, not bytes, so multi-byte queries are measured fairly.
fn too_short(query: &str) -> bool {
    query.chars().count() < 3
}

fn event_stream(
    rx: tokio::sync::mpsc::Receiver<AdviceEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event)
            .unwrap_or_else(|_| r#"{"event":"error","message":"serialization failed"}"#.to_owned());
        Ok(Event::default().event(event.wire_name()).data(data))
    })
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info};

use crate::bootstrap::Application;

/// GET /api/messages: the full turn log, oldest first.
pub async fn list(State(app): State<Application>) -> Response {
    match app.conversation.list_turns().await {
        Ok(turns) => Json(turns).into_response(),
        Err(fault) => {
            error!(error = %fault, "messages.list failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// DELETE /api/messages: reset the conversation.
pub async fn clear(State(app): State<Application>) -> Response {
    match app.conversation.clear_turns().await {
        Ok(()) => {
            info!("conversation cleared");
            Json(serde_json::json!({ "cleared": true })).into_response()
        }
        Err(fault) => {
            error!(error = %fault, "messages.clear failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::State;

    use shopmate_core::config::{ConfigOverrides, LoadOptions};
    use shopmate_core::domain::conversation::NewTurn;

    use crate::bootstrap::{bootstrap, Application};

    async fn test_app(url: &str) -> Application {
        bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap")
    }

    #[tokio::test]
    async fn clear_empties_the_turn_log() {
        let app = test_app("sqlite::memory:?cache=shared").await;
        app.conversation.append_turn(NewTurn::user("hi")).await.expect("append");
        assert_eq!(app.conversation.list_turns().await.expect("list").len(), 1);

        super::clear(State(app.clone())).await;
        assert!(app.conversation.list_turns().await.expect("list").is_empty());

        app.db_pool.close().await;
    }
}

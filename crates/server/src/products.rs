use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use shopmate_core::domain::product::ProductId;

use crate::bootstrap::Application;

/// GET /api/products/{id}: catalog lookup by product id.
pub async fn find(State(app): State<Application>, Path(id): Path<String>) -> Response {
    match app.products.find_by_id(&ProductId(id)).await {
        Ok(Some(product)) => Json(product).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "product not found" })),
        )
            .into_response(),
        Err(fault) => {
            error!(error = %fault, "products.find failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

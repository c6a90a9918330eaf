//! Liveness and readiness probes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::state::AppState;

const SERVICE: &str = "kedai-admin";

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub database: bool,
    /// `redis` or `memory`. A Redis outage degrades to database reads, so it
    /// never fails readiness.
    pub role_cache: &'static str,
}

/// `/health` and `/health/ready`, outside the rate limiters and sessions.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ready", get(readiness))
}

/// The process is up. Dependencies are not checked.
pub async fn liveness() -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        service: SERVICE,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 503 until the database answers.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let database = sqlx::query("SELECT 1").execute(state.pool()).await.is_ok();
    if !database {
        tracing::warn!("Readiness check failed: database unreachable");
    }
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(Readiness {
            status: if database { "ready" } else { "unavailable" },
            database,
            role_cache: state.roles().backend_name(),
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_liveness_reports_service() {
        let app: Router = Router::new().route("/health", get(liveness));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], SERVICE);
    }
}

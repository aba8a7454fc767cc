//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (store change notifications)
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/modules", get(http::http_get_modules))
        .route("/api/v1/shop/items", get(http::http_get_shop_items))
        // Students
        .route("/api/v1/students", get(http::http_get_students))
        .route("/api/v1/students/login", post(http::http_post_student_login))
        .route("/api/v1/students/:id", get(http::http_get_student))
        .route("/api/v1/students/:id/classmates", get(http::http_get_classmates))
        .route("/api/v1/students/:id/assignments", post(http::http_post_assignment))
        .route("/api/v1/students/:id/assessment", post(http::http_post_assessment))
        .route("/api/v1/students/:id/rewards", post(http::http_post_custom_reward))
        // Lessons, shop, placement, reading, tutor
        .route("/api/v1/lessons/start", post(http::http_post_lesson_start))
        .route("/api/v1/lessons/action", post(http::http_post_lesson_action))
        .route("/api/v1/shop/purchase", post(http::http_post_purchase))
        .route("/api/v1/placement/test", get(http::http_get_placement_test))
        .route("/api/v1/placement/submit", post(http::http_post_placement_submit))
        .route("/api/v1/placement/skip", post(http::http_post_placement_skip))
        .route("/api/v1/reading/passage", get(http::http_get_reading_passage))
        .route("/api/v1/reading/analyze", post(http::http_post_reading_analyze))
        .route("/api/v1/tutor/ask", post(http::http_post_tutor))
        // Teachers and classes
        .route("/api/v1/teachers/register", post(http::http_post_teacher_register))
        .route("/api/v1/teachers/login", post(http::http_post_teacher_login))
        .route("/api/v1/teachers/:id", put(http::http_put_teacher))
        .route("/api/v1/teachers/:id/classes", get(http::http_get_teacher_classes))
        .route("/api/v1/classes", get(http::http_get_classes).post(http::http_post_class))
        .route("/api/v1/classes/:id", put(http::http_put_class))
        .route("/api/v1/classes/:id/students", post(http::http_post_class_student))
        .route("/api/v1/classes/:id/assign", post(http::http_post_class_assign))
        .route("/api/v1/custom-modules", get(http::http_get_custom_modules).post(http::http_post_custom_module))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::openai::OpenAI;
    use crate::store::Store;

    async fn app() -> (Router, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("sq_routes_{}", uuid::Uuid::new_v4().simple()));
        let store = Store::open(&dir, "v23", Vec::new()).await.unwrap();
        (build_router(Arc::new(AppState::with_parts(store, None::<OpenAI>))), dir)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_reports_disabled_oracle() {
        let (app, dir) = app().await;
        let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "oracle": false }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn student_login_and_errors_map_to_statuses() {
        let (app, dir) = app().await;
        let (status, body) = call(&app, "POST", "/api/v1/students/login", Some(json!({ "code": " moa-176 " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "s1");

        let (status, _) = call(&app, "POST", "/api/v1/students/login", Some(json!({ "code": "NOPE-000" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "GET", "/api/v1/students/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("ghost"));

        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/shop/purchase",
            Some(json!({ "studentId": "s1", "itemId": "no_such_item" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn lesson_actions_out_of_order_conflict() {
        let (app, dir) = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/lessons/start",
            Some(json!({ "studentId": "s1", "moduleId": "l2_magic_e" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["phase"], "INTRO");

        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/lessons/action",
            Some(json!({ "studentId": "s1", "moduleId": "l2_magic_e", "action": { "type": "finish" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/lessons/action",
            Some(json!({ "studentId": "s1", "moduleId": "l2_magic_e", "action": { "type": "begin" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"]["type"], "advanced");
        assert_eq!(body["phase"], "PRACTICE");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn teacher_gift_and_placement_skip() {
        let (app, dir) = app().await;
        let (status, body) =
            call(&app, "POST", "/api/v1/students/s1/rewards", Some(json!({ "reward": " Sticker " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["customRewards"][0], "Sticker");

        let (status, _) = call(&app, "POST", "/api/v1/students/s1/rewards", Some(json!({ "reward": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", "/api/v1/placement/skip", Some(json!({ "studentId": "s1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["placementTestStatus"], "SKIPPED");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn teacher_registration_hides_password() {
        let (app, dir) = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/teachers/register",
            Some(json!({ "name": "Ms Aroha", "email": "aroha@school.nz", "password": "pw", "className": "Room 4" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["teacher"].get("password").is_none());
        assert_eq!(body["classes"][0]["name"], "Room 4");

        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/teachers/login",
            Some(json!({ "email": "AROHA@school.nz", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let _ = std::fs::remove_dir_all(dir);
    }
}

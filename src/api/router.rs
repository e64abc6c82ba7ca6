//! HTTP route table.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! JSON routes live under `/api/`, stored attachments are served from
//! `/files/`, and the WebSocket upgrade sits at `/ws/connect`.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → handler

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::state::AppState;

/// Request body ceiling, sized so a maximal attachment plus multipart
/// framing still reaches the handler and gets the typed 413 there.
const UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Build the full API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer). Endpoint handlers use `State<ApiContext>` (via `with_state`).
pub fn api_router(state: Arc<AppState>) -> Router {
    let ctx = ApiContext::new(state);
    build_router(ctx)
}

/// Build router from a pre-constructed `ApiContext`.
///
/// Used by integration tests that need the shared `ApiContext` (e.g. to
/// issue WS tickets directly or reach into the mock clients).
#[cfg(test)]
pub(crate) fn router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: rate limited, bearer auth required.
    //
    // Layers apply bottom (innermost) to top (outermost); Extension must be
    // outermost so both middleware fns can extract ApiContext.
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/change-password", post(endpoints::auth::change_password))
        .route("/auth/ws-ticket", post(endpoints::auth::ws_ticket))
        .route(
            "/profile",
            get(endpoints::profiles::me).put(endpoints::profiles::update_me),
        )
        .route("/doctors", get(endpoints::profiles::doctors))
        .route("/cases", post(endpoints::cases::create))
        .route("/cases/mine", get(endpoints::cases::mine))
        .route("/cases/queue", get(endpoints::cases::queue))
        .route("/cases/:id/accept", post(endpoints::cases::accept))
        .route("/cases/:id/start", post(endpoints::cases::start))
        .route("/cases/:id/complete", post(endpoints::cases::complete))
        .route("/cases/:id/hide", post(endpoints::cases::hide))
        .route("/cases/:id/cancel", post(endpoints::cases::cancel))
        .route(
            "/conversations",
            get(endpoints::messages::list).post(endpoints::messages::create),
        )
        .route("/conversations/unread", get(endpoints::messages::unread))
        .route(
            "/conversations/:id/messages",
            get(endpoints::messages::messages).post(endpoints::messages::send),
        )
        .route("/conversations/:id/read", post(endpoints::messages::read))
        .route("/triage/analyze", post(endpoints::triage::analyze))
        .route("/triage/advice", post(endpoints::triage::advice))
        .route("/triage/sessions", get(endpoints::triage::sessions))
        .route("/triage/sessions/:id", get(endpoints::triage::session))
        .route("/triage/sessions/:id/rating", post(endpoints::triage::rate))
        .route("/store/medications", get(endpoints::medications::store_list))
        .route("/store/metadata", get(endpoints::medications::metadata))
        .route("/orders", get(endpoints::orders::history))
        .route("/orders/checkout", post(endpoints::orders::checkout))
        .route("/orders/verify", post(endpoints::orders::verify))
        .route("/orders/cancel", post(endpoints::orders::cancel))
        .route(
            "/admin/medications",
            get(endpoints::medications::admin_list).post(endpoints::medications::create),
        )
        .route("/admin/medications/:id", put(endpoints::medications::update))
        .route(
            "/admin/medications/:id",
            delete(endpoints::medications::delete),
        )
        .route("/admin/users", get(endpoints::admin::users))
        .route("/admin/users/:id/suspend", post(endpoints::admin::suspend))
        .route("/admin/users/:id/activate", post(endpoints::admin::activate))
        .route("/admin/stats", get(endpoints::admin::stats))
        .route("/dashboard/stats", get(endpoints::dashboard::stats))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Public routes: rate-limited only.
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/signup", post(endpoints::auth::signup))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // WebSocket upgrade (ticket-based auth, rate-limited).
    let ws_routes = Router::new()
        .route("/ws/connect", get(websocket::ws_upgrade))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Stored attachments. Uploads are already membership-checked; the URLs
    // contain random stored names, not client input.
    let files = Router::new().nest_service("/files", ServeDir::new(ctx.state.attachments.root()));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .merge(ws_routes)
        .merge(files)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::attachments::AttachmentStore;
    use crate::payments::MockPaymentClient;
    use crate::triage::MockCompletionClient;

    /// Shared context over a temp directory with mock remote clients.
    /// The tempdir guard must outlive the test.
    fn test_context() -> (ApiContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            dir.path().join("api.db"),
            AttachmentStore::new(dir.path().join("files")).unwrap(),
            Arc::new(MockCompletionClient::replying("I suggest rest.")),
            Arc::new(MockPaymentClient::with_session("cs_test_1")),
        );
        (ApiContext::new(Arc::new(state)), dir)
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn call(ctx: &ApiContext, req: Request<Body>) -> axum::http::Response<Body> {
        router_with_ctx(ctx.clone()).oneshot(req).await.unwrap()
    }

    /// Sign up through the API. Returns (user id, bearer token).
    async fn signup(ctx: &ApiContext, email: &str, name: &str, role: &str) -> (Uuid, String) {
        let response = call(
            ctx,
            json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "email": email,
                    "password": "sunflower",
                    "full_name": name,
                    "role": role,
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "signup failed for {email}");
        let body = response_json(response).await;
        let id = Uuid::parse_str(body["user"]["id"].as_str().unwrap()).unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    /// Admins cannot self-register; seed the row directly, then log in
    /// through the API like any other user.
    async fn seed_admin(ctx: &ApiContext, email: &str) -> (Uuid, String) {
        let profile = {
            let conn = ctx.state.open_db().unwrap();
            let now = crate::db::repository::now_utc();
            let profile = crate::models::UserProfile {
                id: Uuid::new_v4(),
                email: email.to_string(),
                full_name: "Root".to_string(),
                role: crate::models::enums::UserRole::Admin,
                phone: None,
                gender: None,
                address: None,
                age: None,
                specialization: None,
                license_number: None,
                years_of_experience: None,
                education: None,
                bio: None,
                consultation_fee: None,
                available_days: None,
                available_hours: None,
                is_active: true,
                suspended_at: None,
                suspended_by: None,
                suspension_reason: None,
                created_at: now,
                updated_at: now,
            };
            let hash = crate::auth::hash_password("sunflower").unwrap();
            crate::db::repository::insert_profile(&conn, &profile, &hash).unwrap();
            profile
        };

        let response = call(
            ctx,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": email, "password": "sunflower" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        (profile.id, body["token"].as_str().unwrap().to_string())
    }

    fn medication_body(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "category": "Pain Relief",
            "price": 4.99,
            "stock_quantity": 100,
            "dosage_form": "Tablet",
            "strength": "500mg",
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let (ctx, _dir) = test_context();
        let response = call(&ctx, request("GET", "/api/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(!body["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (ctx, _dir) = test_context();
        let response = call(&ctx, request("GET", "/api/nonexistent", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn protected_routes_require_auth() {
        let (ctx, _dir) = test_context();
        for (method, uri) in [
            ("GET", "/api/profile"),
            ("POST", "/api/cases"),
            ("GET", "/api/conversations"),
            ("GET", "/api/store/medications"),
            ("POST", "/api/auth/ws-ticket"),
        ] {
            let response = call(&ctx, request(method, uri, None)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            let body = response_json(response).await;
            assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn garbage_tokens_are_rejected() {
        let (ctx, _dir) = test_context();
        let response = call(&ctx, request("GET", "/api/profile", Some("not-a-token"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_then_use_the_session() {
        let (ctx, _dir) = test_context();
        let (id, token) = signup(&ctx, "alice@example.com", "Alice Moreau", "patient").await;

        let response = call(&ctx, request("GET", "/api/profile", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Cache-Control").unwrap(),
            "no-store"
        );

        let body = response_json(response).await;
        assert_eq!(body["id"], id.to_string());
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["role"], "patient");
    }

    #[tokio::test]
    async fn signup_rejects_admin_role() {
        let (ctx, _dir) = test_context();
        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/auth/signup",
                None,
                json!({
                    "email": "root@example.com",
                    "password": "sunflower",
                    "full_name": "Root",
                    "role": "admin",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_json(response).await;
        assert_eq!(body["error"]["code"], "ROLE_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn login_failures_carry_specific_codes() {
        let (ctx, _dir) = test_context();
        signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "nobody@example.com", "password": "whatever" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response_json(response).await["error"]["code"],
            "ACCOUNT_NOT_FOUND"
        );

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "not-it" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response_json(response).await["error"]["code"],
            "INVALID_CREDENTIALS"
        );
    }

    #[tokio::test]
    async fn logout_kills_the_session() {
        let (ctx, _dir) = test_context();
        let (_, token) = signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(&ctx, request("POST", "/api/auth/logout", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&ctx, request("GET", "/api/profile", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn suspension_locks_out_live_sessions_and_logins() {
        let (ctx, _dir) = test_context();
        let (patient_id, patient_token) =
            signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (_, admin_token) = seed_admin(&ctx, "root@example.com").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                &format!("/api/admin/users/{patient_id}/suspend"),
                Some(&admin_token),
                json!({ "reason": "abuse" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // The live session dies with the account.
        let response = call(&ctx, request("GET", "/api/profile", Some(&patient_token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // So does a fresh login.
        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "sunflower" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Reactivation restores login.
        let response = call(
            &ctx,
            request(
                "POST",
                &format!("/api/admin/users/{patient_id}/activate"),
                Some(&admin_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "sunflower" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn case_lifecycle_over_http() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (_, doctor) = signup(&ctx, "benali@example.com", "Dr. Benali", "doctor").await;
        let (_, rival) = signup(&ctx, "cheng@example.com", "Dr. Cheng", "doctor").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/cases",
                Some(&patient),
                json!({
                    "case_reason": "Chest pain",
                    "description": "Sharp pain since this morning",
                    "emergency_level": "high",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let case = response_json(response).await;
        let case_id = case["id"].as_str().unwrap().to_string();
        assert_eq!(case["status"], "pending");

        // Both doctors see it in the queue.
        let response = call(&ctx, request("GET", "/api/cases/queue", Some(&doctor))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let queue = response_json(response).await;
        assert_eq!(queue.as_array().unwrap().len(), 1);

        // First accept wins, the rival gets a conflict.
        let response = call(
            &ctx,
            request("POST", &format!("/api/cases/{case_id}/accept"), Some(&doctor)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "accepted");

        let response = call(
            &ctx,
            request("POST", &format!("/api/cases/{case_id}/accept"), Some(&rival)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response_json(response).await["error"]["code"], "CASE_TAKEN");

        // Winner drives it to completion.
        let response = call(
            &ctx,
            request("POST", &format!("/api/cases/{case_id}/start"), Some(&doctor)),
        )
        .await;
        assert_eq!(response_json(response).await["status"], "in_progress");

        let response = call(
            &ctx,
            request(
                "POST",
                &format!("/api/cases/{case_id}/complete"),
                Some(&doctor),
            ),
        )
        .await;
        assert_eq!(response_json(response).await["status"], "completed");

        // The patient sees the final state under /mine.
        let response = call(&ctx, request("GET", "/api/cases/mine", Some(&patient))).await;
        let mine = response_json(response).await;
        assert_eq!(mine[0]["status"], "completed");
    }

    #[tokio::test]
    async fn patients_cannot_work_the_queue() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(&ctx, request("GET", "/api/cases/queue", Some(&patient))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response_json(response).await["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn messaging_flow_with_attachment() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (doctor_id, doctor) = signup(&ctx, "benali@example.com", "Dr. Benali", "doctor").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/conversations",
                Some(&patient),
                json!({ "counterpart_id": doctor_id }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let conv_id = response_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string();

        // Multipart send: text plus a small PDF.
        let boundary = "telecare-test-boundary";
        let payload = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"text\"\r\n\r\n\
             Here is the scan\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"scan.pdf\"\r\n\
             Content-Type: application/pdf\r\n\r\n\
             %PDF-1.4 fake scan body\r\n\
             --{boundary}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/conversations/{conv_id}/messages"))
            .header("Authorization", format!("Bearer {patient}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(payload))
            .unwrap();
        let response = call(&ctx, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        let message = response_json(response).await;
        assert_eq!(message["message_text"], "Here is the scan");
        assert_eq!(message["attachment"]["name"], "scan.pdf");
        assert_eq!(message["attachment"]["content_type"], "application/pdf");
        let url = message["attachment"]["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/files/"));

        // The stored file is downloadable through the files mount.
        let response = call(&ctx, request("GET", &url, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"%PDF-1.4 fake scan body");

        // The doctor sees one unread message, reads it, badge drops to zero.
        let response = call(&ctx, request("GET", "/api/conversations/unread", Some(&doctor))).await;
        assert_eq!(response_json(response).await["unread"], 1);

        let response = call(
            &ctx,
            request(
                "POST",
                &format!("/api/conversations/{conv_id}/read"),
                Some(&doctor),
            ),
        )
        .await;
        assert_eq!(response_json(response).await["updated"], 1);

        let response = call(&ctx, request("GET", "/api/conversations/unread", Some(&doctor))).await;
        assert_eq!(response_json(response).await["unread"], 0);

        // History is visible to both participants, not to outsiders.
        let response = call(
            &ctx,
            request(
                "GET",
                &format!("/api/conversations/{conv_id}/messages"),
                Some(&doctor),
            ),
        )
        .await;
        assert_eq!(response_json(response).await.as_array().unwrap().len(), 1);

        let (_, outsider) = signup(&ctx, "eve@example.com", "Eve", "patient").await;
        let response = call(
            &ctx,
            request(
                "GET",
                &format!("/api/conversations/{conv_id}/messages"),
                Some(&outsider),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn oversized_attachment_is_rejected_before_storage() {
        let (ctx, dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (doctor_id, _) = signup(&ctx, "benali@example.com", "Dr. Benali", "doctor").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/conversations",
                Some(&patient),
                json!({ "counterpart_id": doctor_id }),
            ),
        )
        .await;
        let conv_id = response_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string();

        let boundary = "telecare-test-boundary";
        let mut payload = Vec::new();
        payload.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"huge.bin\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        payload.extend_from_slice(&vec![0u8; 10 * 1024 * 1024 + 1]);
        payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/conversations/{conv_id}/messages"))
            .header("Authorization", format!("Bearer {patient}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(payload))
            .unwrap();
        let response = call(&ctx, req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response_json(response).await["error"]["code"], "FILE_TOO_LARGE");

        // Nothing was written under the attachment root.
        let stored: Vec<_> = walk_files(dir.path().join("files").as_path());
        assert!(stored.is_empty(), "unexpected files: {stored:?}");
    }

    fn walk_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    found.push(path);
                }
            }
        }
        found
    }

    #[tokio::test]
    async fn triage_analyze_stores_a_ratable_session() {
        let dir = tempfile::tempdir().unwrap();
        let ai = Arc::new(MockCompletionClient::scripted(vec![
            Ok(r#"{"diagnosis": "Tension headache", "recommendation": "Rest and hydrate",
                   "severity": "low", "requiresDoctor": false, "confidence": 82}"#
                .to_string()),
            Ok("Headache Check".to_string()),
        ]));
        let state = AppState::new(
            dir.path().join("api.db"),
            AttachmentStore::new(dir.path().join("files")).unwrap(),
            ai,
            Arc::new(MockPaymentClient::with_session("cs_test_1")),
        );
        let ctx = ApiContext::new(Arc::new(state));
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/triage/analyze",
                Some(&patient),
                json!({ "symptoms": "Headache behind the eyes", "severity": "mild" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let session = response_json(response).await;
        assert_eq!(session["assessment"]["diagnosis"], "Tension headache");
        assert_eq!(session["assessment"]["severity"], "low");
        assert_eq!(session["title"], "Headache Check");
        let session_id = session["id"].as_str().unwrap().to_string();

        // Listed, fetchable, ratable.
        let response = call(&ctx, request("GET", "/api/triage/sessions", Some(&patient))).await;
        assert_eq!(response_json(response).await.as_array().unwrap().len(), 1);

        let response = call(
            &ctx,
            json_request(
                "POST",
                &format!("/api/triage/sessions/{session_id}/rating"),
                Some(&patient),
                json!({ "rating": 5, "comment": "clear" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(
            &ctx,
            request(
                "GET",
                &format!("/api/triage/sessions/{session_id}"),
                Some(&patient),
            ),
        )
        .await;
        assert_eq!(response_json(response).await["rating"], 5);
    }

    #[tokio::test]
    async fn doctors_cannot_run_triage() {
        let (ctx, _dir) = test_context();
        let (_, doctor) = signup(&ctx, "benali@example.com", "Dr. Benali", "doctor").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/triage/analyze",
                Some(&doctor),
                json!({ "symptoms": "Headache", "severity": "mild" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn catalog_admin_writes_and_store_reads() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (_, admin) = seed_admin(&ctx, "root@example.com").await;

        // Patients cannot write the catalog.
        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/admin/medications",
                Some(&patient),
                medication_body("Aspirin"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/admin/medications",
                Some(&admin),
                medication_body("Aspirin"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let med = response_json(response).await;
        let med_id = med["id"].as_str().unwrap().to_string();
        assert_eq!(med["name"], "Aspirin");

        // The storefront sees it; search narrows it.
        let response = call(&ctx, request("GET", "/api/store/medications", Some(&patient))).await;
        assert_eq!(response_json(response).await.as_array().unwrap().len(), 1);

        let response = call(
            &ctx,
            request("GET", "/api/store/medications?query=aspir", Some(&patient)),
        )
        .await;
        assert_eq!(response_json(response).await.as_array().unwrap().len(), 1);

        let response = call(
            &ctx,
            request("GET", "/api/store/medications?query=ibuprofen", Some(&patient)),
        )
        .await;
        assert!(response_json(response).await.as_array().unwrap().is_empty());

        // Metadata lists the fixed category set.
        let response = call(&ctx, request("GET", "/api/store/metadata", Some(&patient))).await;
        let metadata = response_json(response).await;
        assert!(metadata["categories"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "Pain Relief"));

        // Update hides it from the storefront but not from the admin list.
        let mut updated = medication_body("Aspirin");
        updated["is_available"] = json!(false);
        let response = call(
            &ctx,
            json_request(
                "PUT",
                &format!("/api/admin/medications/{med_id}"),
                Some(&admin),
                updated,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&ctx, request("GET", "/api/store/medications", Some(&patient))).await;
        assert!(response_json(response).await.as_array().unwrap().is_empty());
        let response = call(&ctx, request("GET", "/api/admin/medications", Some(&admin))).await;
        assert_eq!(response_json(response).await.as_array().unwrap().len(), 1);

        // Delete is idempotent: the second call reports nothing removed.
        let response = call(
            &ctx,
            request(
                "DELETE",
                &format!("/api/admin/medications/{med_id}"),
                Some(&admin),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["deleted"], true);

        let response = call(
            &ctx,
            request(
                "DELETE",
                &format!("/api/admin/medications/{med_id}"),
                Some(&admin),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["deleted"], false);
    }

    #[tokio::test]
    async fn checkout_verify_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let payments = Arc::new(MockPaymentClient::with_session("cs_test_1"));
        let state = AppState::new(
            dir.path().join("api.db"),
            AttachmentStore::new(dir.path().join("files")).unwrap(),
            Arc::new(MockCompletionClient::replying("ok")),
            payments.clone(),
        );
        let ctx = ApiContext::new(Arc::new(state));
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/orders/checkout",
                Some(&patient),
                json!({
                    "amount_cents": 1499,
                    "item_name": "Paracetamol 500mg",
                    "success_url": "https://app.example.test/paid",
                    "cancel_url": "https://app.example.test/cart",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let started = response_json(response).await;
        assert_eq!(started["order"]["status"], "pending");
        assert!(started["checkout_url"]
            .as_str()
            .unwrap()
            .contains("cs_test_1"));

        // Verifying before the provider confirms yields 402.
        payments.mark_unpaid("cs_test_1");
        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/orders/verify",
                Some(&patient),
                json!({ "session_id": "cs_test_1" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        // After payment the order flips to paid, idempotently.
        payments.mark_paid("cs_test_1");
        for _ in 0..2 {
            let response = call(
                &ctx,
                json_request(
                    "POST",
                    "/api/orders/verify",
                    Some(&patient),
                    json!({ "session_id": "cs_test_1" }),
                ),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response_json(response).await["status"], "paid");
        }

        let response = call(&ctx, request("GET", "/api/orders", Some(&patient))).await;
        let history = response_json(response).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["status"], "paid");
    }

    #[tokio::test]
    async fn cancel_voids_a_pending_order() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/orders/checkout",
                Some(&patient),
                json!({
                    "amount_cents": 1499,
                    "item_name": "Paracetamol 500mg",
                    "success_url": "https://app.example.test/paid",
                    "cancel_url": "https://app.example.test/cart",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(
            &ctx,
            json_request(
                "POST",
                "/api/orders/cancel",
                Some(&patient),
                json!({ "session_id": "cs_test_1" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "canceled");
    }

    #[tokio::test]
    async fn admin_stats_are_admin_only() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (_, admin) = seed_admin(&ctx, "root@example.com").await;

        let response = call(&ctx, request("GET", "/api/admin/stats", Some(&patient))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = call(&ctx, request("GET", "/api/admin/stats", Some(&admin))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stats = response_json(response).await;
        assert_eq!(stats["total_patients"], 1);
        assert_eq!(stats["total_admins"], 1);
    }

    #[tokio::test]
    async fn doctor_dashboard_is_doctor_only() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (_, doctor) = signup(&ctx, "benali@example.com", "Dr. Benali", "doctor").await;

        let response = call(&ctx, request("GET", "/api/dashboard/stats", Some(&patient))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = call(&ctx, request("GET", "/api/dashboard/stats", Some(&doctor))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stats = response_json(response).await;
        assert_eq!(stats["active_cases"], 0);
        assert_eq!(stats["unread_messages"], 0);
    }

    #[tokio::test]
    async fn doctor_directory_lists_active_doctors() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;
        let (doctor_id, _) = signup(&ctx, "benali@example.com", "Dr. Benali", "doctor").await;

        let response = call(&ctx, request("GET", "/api/doctors", Some(&patient))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listing = response_json(response).await;
        assert_eq!(listing.as_array().unwrap().len(), 1);
        assert_eq!(listing[0]["id"], doctor_id.to_string());
    }

    #[tokio::test]
    async fn rate_limit_eventually_answers_429() {
        let (ctx, _dir) = test_context();

        // Anonymous callers share one window; the 121st request in a minute
        // trips the limiter.
        let mut last = StatusCode::OK;
        for _ in 0..121 {
            let response = call(&ctx, request("GET", "/api/health", None)).await;
            last = response.status();
        }
        assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn ws_ticket_issued_over_http() {
        let (ctx, _dir) = test_context();
        let (_, patient) = signup(&ctx, "alice@example.com", "Alice", "patient").await;

        let response = call(&ctx, request("POST", "/api/auth/ws-ticket", Some(&patient))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert!(!body["ticket"].as_str().unwrap().is_empty());
        assert_eq!(body["expires_in_secs"], 30);
    }
}

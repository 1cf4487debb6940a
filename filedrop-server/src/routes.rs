use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::auth::identity;
use crate::config::ServerConfig;
use crate::handlers::{system, uploads};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let upload_route = post(uploads::upload).layer(DefaultBodyLimit::max(config.max_upload_bytes));

    let identity_routes = Router::new()
        .route("/upload", upload_route.clone())
        .route("/upload/", upload_route)
        .route("/uploads", get(uploads::list_uploads))
        .route("/uploads/{file}", get(uploads::download))
        .layer(middleware::from_fn_with_state(state.clone(), identity::identity_middleware));

    let public_routes = Router::new().route("/health", get(system::health));

    let router = Router::new()
        .merge(public_routes)
        .merge(identity_routes)
        .fallback_service(
            ServeDir::new(&config.web_dir).fallback(ServeFile::new(config.web_dir.join("index.html"))),
        )
        .with_state(state);

    if config.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use filedrop_common::Identity;

    use crate::auth::identity::{HeaderIdentity, IdentityResolver, StaticIdentity};
    use crate::storage::DirectoryStore;

    const BOUNDARY: &str = "filedrop-test-boundary";

    struct Harness {
        _dir: tempfile::TempDir,
        app: Router,
    }

    async fn harness_with(resolver: Arc<dyn IdentityResolver>, max_upload_bytes: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let store = DirectoryStore::new(&root);
        store.init().await.unwrap();

        let web_dir = dir.path().join("web");
        std::fs::create_dir_all(&web_dir).unwrap();
        std::fs::write(web_dir.join("index.html"), "<html>filedrop</html>").unwrap();

        let config = ServerConfig {
            storage_root: root.clone(),
            web_dir,
            max_upload_bytes,
            ..ServerConfig::default()
        };
        let state = Arc::new(AppState::new(Arc::new(store), resolver, root, max_upload_bytes));
        Harness {
            _dir: dir,
            app: build_router(state, &config),
        }
    }

    async fn harness() -> Harness {
        let resolver = Arc::new(StaticIdentity::new(Identity::parse("125").unwrap()));
        harness_with(resolver, 1024 * 1024).await
    }

    fn multipart_body(desired: Option<&str>, original: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(name) = desired {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fileName\"\r\n\r\n{name}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{original}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(user: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(user) = user {
            builder = builder.header("x-filedrop-user", user);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get_request(user: Option<&str>, uri: &str) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-filedrop-user", user);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    async fn upload(app: &Router, desired: Option<&str>, original: &str, data: &[u8]) -> serde_json::Value {
        let resp = send(app, upload_request(None, multipart_body(desired, original, data))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await
    }

    #[tokio::test]
    async fn test_upload_then_download_is_identical() {
        let h = harness().await;
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        let json = upload(&h.app, None, "data.bin", &data).await;
        assert_eq!(json, serde_json::json!({ "fileName": "data.bin" }));

        let resp = send(&h.app, get_request(None, "/uploads/data.bin")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, data);
    }

    #[tokio::test]
    async fn test_second_upload_overwrites() {
        let h = harness().await;
        upload(&h.app, None, "note.txt", b"first").await;
        upload(&h.app, Some("note.txt"), "other.txt", b"second").await;

        let resp = send(&h.app, get_request(None, "/uploads/note.txt")).await;
        assert_eq!(body_bytes(resp).await, b"second");

        let resp = send(&h.app, get_request(None, "/uploads")).await;
        assert_eq!(body_json(resp).await, serde_json::json!(["note.txt"]));
    }

    #[tokio::test]
    async fn test_listing_without_uploads_is_not_found() {
        let h = harness().await;
        let resp = send(&h.app, get_request(None, "/uploads")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(resp).await, b"Directory not found");
    }

    #[tokio::test]
    async fn test_listing_after_one_upload() {
        let h = harness().await;
        upload(&h.app, None, "only.txt", b"1").await;

        let resp = send(&h.app, get_request(None, "/uploads")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!(["only.txt"]));
    }

    #[tokio::test]
    async fn test_spaces_become_hyphens() {
        let h = harness().await;
        let json = upload(&h.app, None, "my file.txt", b"hello").await;
        assert_eq!(json["fileName"], "my-file.txt");

        let resp = send(&h.app, get_request(None, "/uploads/my-file.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");

        let resp = send(&h.app, get_request(None, "/uploads/my%20file.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(resp).await, b"File not found");
    }

    #[tokio::test]
    async fn test_desired_name_wins_over_original() {
        let h = harness().await;
        let json = upload(&h.app, Some("holiday photo.jpg"), "IMG_0001.JPG", b"jpeg").await;
        assert_eq!(json["fileName"], "holiday-photo.jpg");

        let json = upload(&h.app, Some(""), "IMG 0002.JPG", b"jpeg").await;
        assert_eq!(json["fileName"], "IMG-0002.JPG");
    }

    #[tokio::test]
    async fn test_empty_file_accepted() {
        let h = harness().await;
        upload(&h.app, None, "empty.txt", b"").await;
        let resp = send(&h.app, get_request(None, "/uploads/empty.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let h = harness().await;
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fileName\"\r\n\r\nx.txt\r\n--{BOUNDARY}--\r\n"
        );
        let resp = send(&h.app, upload_request(None, body.into_bytes())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await, serde_json::json!({ "error": "No file provided" }));
    }

    #[tokio::test]
    async fn test_non_multipart_upload_rejected_as_json() {
        let h = harness().await;
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = send(&h.app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_traversal_name_rejected() {
        let h = harness().await;
        let resp = send(
            &h.app,
            upload_request(None, multipart_body(Some("../../escape.txt"), "a.txt", b"x")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());

        let resp = send(&h.app, get_request(None, "/uploads/..%2F..%2Fetc%2Fpasswd")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_trailing_slash_upload_route() {
        let h = harness().await;
        let mut req = upload_request(None, multipart_body(None, "slash.txt", b"s"));
        *req.uri_mut() = "/upload/".parse().unwrap();
        let resp = send(&h.app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let resolver = Arc::new(StaticIdentity::new(Identity::parse("125").unwrap()));
        let h = harness_with(resolver, 512).await;
        let resp = send(
            &h.app,
            upload_request(None, multipart_body(None, "big.bin", &[7u8; 4096])),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = send(&h.app, get_request(None, "/uploads")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_range_request() {
        let h = harness().await;
        upload(&h.app, None, "digits.txt", b"0123456789").await;

        let mut req = get_request(None, "/uploads/digits.txt");
        req.headers_mut().insert(header::RANGE, "bytes=3-5".parse().unwrap());
        let resp = send(&h.app, req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 3-5/10");
        assert_eq!(body_bytes(resp).await, b"345");
    }

    #[tokio::test]
    async fn test_identities_isolated_over_http() {
        let resolver = Arc::new(HeaderIdentity::new(header::HeaderName::from_static(
            "x-filedrop-user",
        )));
        let h = harness_with(resolver, 1024 * 1024).await;

        let resp = send(
            &h.app,
            upload_request(Some("alice"), multipart_body(None, "diary.txt", b"dear diary")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&h.app, get_request(Some("alice"), "/uploads/diary.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&h.app, get_request(Some("bob"), "/uploads/diary.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&h.app, get_request(Some("bob"), "/uploads")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_identity_rejected_before_storage() {
        let resolver = Arc::new(HeaderIdentity::new(header::HeaderName::from_static(
            "x-filedrop-user",
        )));
        let h = harness_with(resolver, 1024 * 1024).await;

        let resp = send(&h.app, upload_request(None, multipart_body(None, "x.txt", b"x"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await, serde_json::json!({ "error": "User not found" }));

        let resp = send(&h.app, get_request(None, "/uploads")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_and_static_fallback() {
        let h = harness().await;
        let resp = send(&h.app, get_request(None, "/health")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["storage"], "ok");

        let resp = send(&h.app, get_request(None, "/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"<html>filedrop</html>");
    }
}

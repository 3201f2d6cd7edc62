//! End-to-end flows through the full router against the in-memory store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use carehome_backend::auth::jwt;
use carehome_backend::config::AppConfig;
use carehome_backend::create_app;
use carehome_backend::db::models::{FieldType, SiteContentItem};
use carehome_backend::db::{MemoryStore, Store};
use carehome_backend::state::AppState;

const SETUP_KEY: &str = "flow-setup-key";
const EMAIL: &str = "directora@residencia.test";
const PASSWORD: &str = "cuidamos2024";

struct TestApp {
    state: AppState,
    store: Arc<MemoryStore>,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = HashMap::from([
            ("SETUP_KEY", SETUP_KEY.to_string()),
            ("BCRYPT_COST", "4".to_string()),
            ("UPLOAD_DIR", uploads.path().to_str().unwrap().to_string()),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        Self {
            state,
            store,
            _uploads: uploads,
        }
    }

    fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    fn upload_dir_entries(&self) -> usize {
        std::fs::read_dir(&self.state.config.upload.dir)
            .map(|d| d.count())
            .unwrap_or(0)
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    /// Provisions the admin and returns a fresh token.
    async fn login_admin(&self) -> String {
        let (status, _) = self
            .json(
                "POST",
                "/api/auth/create-admin",
                None,
                Some(json!({ "email": EMAIL, "password": PASSWORD, "setup_key": SETUP_KEY })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .json(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": EMAIL, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn upload(
        &self,
        token: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "flow-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::post("/api/upload")
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.call(request).await
    }
}

#[tokio::test]
async fn login_succeeds_and_failures_are_indistinguishable() {
    let app = TestApp::new();
    let token = app.login_admin().await;

    let claims = jwt::verify_token(&token, &app.state.config.auth.jwt_secret).unwrap();
    assert_eq!(claims.email, EMAIL);

    let wrong_password = app
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": EMAIL, "password": "not-the-password" })),
        )
        .await;
    let unknown_email = app
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "nadie@residencia.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn deleting_a_category_leaves_posts_with_null_category() {
    let app = TestApp::new();
    let token = app.login_admin().await;

    let (status, category) = app
        .json(
            "POST",
            "/api/categories",
            Some(&token),
            Some(json!({ "name": "Salud", "slug": "salud" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let c1 = category["id"].as_str().unwrap().to_string();

    let (status, created) = app
        .json(
            "POST",
            "/api/posts",
            Some(&token),
            Some(json!({ "title": "Test", "category_id": c1, "status": "draft" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let p1 = created["id"].as_str().unwrap().to_string();

    let (status, before) = app
        .json("GET", &format!("/api/posts/{p1}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["category"]["id"], c1.as_str());
    assert_eq!(before["category"]["name"], "Salud");

    let (status, body) = app
        .json("DELETE", &format!("/api/categories/{c1}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, after) = app
        .json("GET", &format!("/api/posts/{p1}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(after["category"].is_null());
    assert_eq!(after["category_id"], c1.as_str());

    let mut unchanged = before.clone();
    unchanged["category"] = Value::Null;
    assert_eq!(after, unchanged);
}

#[tokio::test]
async fn created_post_reads_back_with_defaults() {
    let app = TestApp::new();
    let token = app.login_admin().await;

    let sent = json!({
        "title": "Taller de Pintura",
        "slug": "taller-de-pintura",
        "content": "<p>Colores</p>",
        "featured_image": "/api/uploads/1-abcdef.png",
    });
    let (_, created) = app.json("POST", "/api/posts", Some(&token), Some(sent)).await;
    let id = created["id"].as_str().unwrap();

    let (status, post) = app.json("GET", &format!("/api/posts/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Taller de Pintura");
    assert_eq!(post["slug"], "taller-de-pintura");
    assert_eq!(post["content"], "<p>Colores</p>");
    assert_eq!(post["featured_image"], "/api/uploads/1-abcdef.png");
    assert_eq!(post["excerpt"], "");
    assert_eq!(post["video_url"], "");
    assert!(post["category_id"].is_null());
    assert_eq!(post["status"], "draft");
}

#[tokio::test]
async fn published_filter_never_returns_drafts() {
    let app = TestApp::new();
    let token = app.login_admin().await;

    let posts = [
        json!({ "title": "Publicado sin fecha", "status": "published" }),
        json!({ "title": "Borrador con fecha", "status": "draft", "published_at": "2020-01-01T00:00:00Z" }),
        json!({ "title": "Publicado futuro", "status": "published", "published_at": "2999-01-01T00:00:00Z" }),
        json!({ "title": "Borrador" }),
    ];
    for post in posts {
        let (status, _) = app.json("POST", "/api/posts", Some(&token), Some(post)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, listed) = app.json("GET", "/api/posts?status=published", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|p| p["status"] == "published"));
    // Newest first
    assert_eq!(listed[0]["title"], "Publicado futuro");

    let (_, limited) = app.json("GET", "/api/posts?limit=3", None, None).await;
    assert_eq!(limited.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn repeated_page_views_are_never_merged() {
    let app = TestApp::new();
    let token = app.login_admin().await;

    for _ in 0..5 {
        let (status, _) = app
            .json(
                "POST",
                "/api/analytics",
                None,
                Some(json!({ "page_path": "/contacto", "session_id": "sess-42" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, rows) = app.json("GET", "/api/analytics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 5);

    let mut ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    assert!(rows.iter().all(|r| r["session_id"] == "sess-42"));
}

#[tokio::test]
async fn content_update_is_visible_through_the_cache() {
    let app = TestApp::new();
    let token = app.login_admin().await;
    app.store
        .seed_content(&[
            SiteContentItem {
                key: "hero_title".to_string(),
                value: "Bienvenidos".to_string(),
                section: "home".to_string(),
                label: "Hero title".to_string(),
                field_type: FieldType::Input,
            },
            SiteContentItem {
                key: "phone".to_string(),
                value: "555-0100".to_string(),
                section: "contact".to_string(),
                label: "Phone".to_string(),
                field_type: FieldType::Input,
            },
        ])
        .await
        .unwrap();

    // Warm the cache with the old value.
    app.json("GET", "/api/content", None, None).await;

    let (status, _) = app
        .json(
            "PUT",
            "/api/content/hero_title",
            Some(&token),
            Some(json!({ "value": "Un hogar para sus mayores" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, first) = app.json("GET", "/api/content", None, None).await;
    let loads_after_first = app.store.content_loads();
    let (_, second) = app.json("GET", "/api/content", None, None).await;

    let heroes: Vec<&Value> = first
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| item["key"] == "hero_title")
        .collect();
    assert_eq!(heroes.len(), 1);
    assert_eq!(heroes[0]["value"], "Un hogar para sus mayores");

    assert_eq!(first, second);
    assert_eq!(app.store.content_loads(), loads_after_first);
}

#[tokio::test]
async fn upload_filter_accepts_extension_or_mime_and_rejects_neither() {
    let app = TestApp::new();
    let token = app.login_admin().await;
    let data = b"\x89PNG\r\n\x1a\n0000";

    let (status, body) = app
        .upload(&token, "foto.png", "application/octet-stream", data)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("/api/uploads/"));

    let (status, _) = app.upload(&token, "foto.bin", "image/webp", data).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.upload_dir_entries(), 2);

    let (status, body) = app.upload(&token, "informe.pdf", "application/pdf", data).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(app.upload_dir_entries(), 2);

    // The returned URL resolves through the static file service.
    let (_, body) = app.upload(&token, "otra.gif", "image/gif", data).await;
    let url = body["url"].as_str().unwrap();
    let response = app
        .app()
        .oneshot(Request::get(url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

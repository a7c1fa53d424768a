use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use sale_monitor::web::{create_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    server: MockServer,
    _data: DataDir,
}

impl TestApp {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let data = DataDir::with_products(&[]);
        let history = memory_history().await;
        let monitor = data
            .monitor(extractor(1, Arc::new(RecordingSleeper::default())))
            .with_history(history.clone());

        let router = create_router(AppState {
            monitor: Arc::new(monitor),
            history,
        });

        Self {
            router,
            server,
            _data: data,
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec(), content_type)
    }

    async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes, _) = self.call(method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn product_url(&self) -> String {
        format!("{}/item", self.server.uri())
    }
}

#[tokio::test]
async fn test_health_and_dashboard() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, page, content_type) = app.call(Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(String::from_utf8(page).unwrap().contains("<html"));
}

#[tokio::test]
async fn test_history_endpoints_require_url() {
    let app = TestApp::new().await;

    for uri in ["/api/product/history", "/api/product/stats", "/api/product/history?url="] {
        let (status, body) = app.json(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_add_list_and_duplicate() {
    let app = TestApp::new().await;
    let url = app.product_url();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/product/add",
            Some(json!({
                "name": "Blender",
                "url": url,
                "target_price": "49.99",
                "discount_threshold": 15
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target_price"], 49.99);

    let (status, _) = app
        .json(Method::POST, "/api/product/add", Some(json!({"name": "Blender again", "url": url})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(Method::POST, "/api/product/add", Some(json!({"name": "Bad", "url": "not a url"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.json(Method::GET, "/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    let products = body["data"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Blender");
    assert_eq!(products[0]["current_price"], Value::Null);
}

#[tokio::test]
async fn test_update_toggle_delete() {
    let app = TestApp::new().await;
    let url = app.product_url();
    app.json(Method::POST, "/api/product/add", Some(json!({"name": "Fan", "url": url})))
        .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/product/update",
            Some(json!({"url": url, "target_price": "", "notification_cooldown_hours": "12"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target_price"], Value::Null);
    assert_eq!(body["data"]["notification_cooldown_hours"], 12);

    let (status, body) = app
        .json(Method::POST, "/api/product/toggle", Some(json!({"url": url})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    for route in ["/api/product/toggle", "/api/product/delete", "/api/product/update", "/api/product/check"] {
        let (status, _) = app
            .json(Method::POST, route, Some(json!({"url": "https://shop.example/none"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", route);
    }

    let (status, _) = app
        .json(Method::POST, "/api/product/delete", Some(json!({"url": url})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.json(Method::GET, "/api/products", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_check_then_history_stats_and_export() {
    let app = TestApp::new().await;
    let url = app.product_url();
    serve_page(&app.server, "/item", product_page(r#"<span class="price">$129.00</span>"#)).await;

    app.json(Method::POST, "/api/product/add", Some(json!({"name": "Drill", "url": url})))
        .await;

    let (status, body) = app
        .json(Method::POST, "/api/product/check", Some(json!({"url": url})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], 129.0);
    assert_eq!(body["data"]["source"], "auto");

    let (_, body) = app.json(Method::GET, "/api/products", None).await;
    assert_eq!(body["data"][0]["current_price"], 129.0);

    let query = format!("url={}", url);
    let (status, body) = app
        .json(Method::GET, &format!("/api/product/history?{}&days=7", query), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["check_status"], "success");

    let (_, body) = app
        .json(Method::GET, &format!("/api/product/stats?{}", query), None)
        .await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["min_price"], 129.0);

    let (status, csv, content_type) = app.call(Method::GET, "/api/history/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/csv"));
    let csv = String::from_utf8(csv).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("product_name,product_url,price,timestamp,status"));
    let row = lines.next().unwrap();
    assert!(row.starts_with(&format!("Drill,{},129,", url)));
    assert!(row.ends_with(",success"));
}

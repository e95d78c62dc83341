use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use stockroom_api::app::{AppServices, build_app};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory storage, ephemeral port.
        let app = build_app(AppServices::in_memory(), Duration::from_secs(5));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn call(&self, method: reqwest::Method, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        let body: Value = res.json().await.unwrap();
        (status, body)
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(reqwest::Method::PUT, path, body).await
    }

    async fn get(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(reqwest::Method::GET, path, body).await
    }

    async fn patch(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(reqwest::Method::PATCH, path, body).await
    }

    async fn delete(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(reqwest::Method::DELETE, path, body).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(reqwest::Method::POST, path, body).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn seed_area(srv: &TestServer, id: i64, parent: Option<i64>) {
    let (status, body) = srv
        .put("/area", json!({ "id": id, "name": format!("area {id}"), "parent": parent }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

async fn seed_item(srv: &TestServer, id: i64, quantity: i64, area: i64) -> Value {
    let (status, body) = srv
        .put(
            "/item",
            json!({ "id": id, "name": format!("item {id}"), "quantity": quantity, "area": area }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_reports_success() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn stock_checkout_then_overdraw_is_rejected() {
    let srv = TestServer::spawn().await;
    seed_area(&srv, 1, None).await;
    let created = seed_item(&srv, 1, 10, 1).await;
    assert_eq!(created["status"], "success");
    assert_eq!(created["code"], 201);
    assert_eq!(created["changes"]["available"], 10);

    let (status, body) = srv
        .post(
            "/updateStock",
            json!({ "id": 1, "quantity": 3, "checking": "out", "user_id": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["available"], 7);

    let (status, body) = srv
        .post(
            "/updateStock",
            json!({ "id": 1, "quantity": 8, "checking": "out", "user_id": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 409);
    assert_eq!(body["message"], "proposed value -1 not in range 0-10");

    let (status, body) = srv.get("/item", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    let item = &body["response"][0];
    assert_eq!(item["available"], 7);
    assert_eq!(item["checkoutHistory"].as_array().unwrap().len(), 1);
    assert_eq!(item["checkoutHistory"][0]["checking"], "out");
    assert_eq!(item["checkoutHistory"][0]["userID"], 1);

    let (status, body) = srv.get("/item/history", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_quantities_are_bad_requests() {
    let srv = TestServer::spawn().await;
    seed_area(&srv, 1, None).await;
    seed_item(&srv, 1, 10, 1).await;

    for quantity in [json!(0), json!(-3), json!(2.5), json!("4")] {
        let (status, body) = srv
            .post(
                "/updateStock",
                json!({ "id": 1, "quantity": quantity, "checking": "in", "user_id": 1 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{quantity}: {body}");
    }
}

#[tokio::test]
async fn concurrent_stock_updates_stay_in_bounds() {
    let srv = std::sync::Arc::new(TestServer::spawn().await);
    seed_area(&srv, 1, None).await;
    seed_item(&srv, 1, 4, 1).await;

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let srv = srv.clone();
            let checking = if i % 2 == 0 { "out" } else { "in" };
            tokio::spawn(async move {
                srv.post(
                    "/updateStock",
                    json!({ "id": 1, "quantity": 3, "checking": checking, "user_id": i }),
                )
                .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        match status {
            StatusCode::OK => accepted += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }

    let (_, body) = srv.get("/item", json!({ "id": 1 })).await;
    let item = &body["response"][0];
    let available = item["available"].as_i64().unwrap();
    assert!((0..=4).contains(&available));
    assert_eq!(item["checkoutHistory"].as_array().unwrap().len(), accepted);
}

#[tokio::test]
async fn deleting_an_area_orphans_items_in_the_subtree() {
    let srv = TestServer::spawn().await;
    seed_area(&srv, 1, None).await;
    seed_area(&srv, 2, Some(1)).await;
    seed_area(&srv, 3, None).await;
    seed_item(&srv, 10, 1, 1).await;
    seed_item(&srv, 11, 1, 2).await;
    seed_item(&srv, 12, 1, 3).await;

    let (status, body) = srv.delete("/area", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["orphanedItems"], 2);

    let (_, body) = srv.get("/item", json!({ "orphaned": true })).await;
    let orphaned: Vec<i64> = body["response"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_i64().unwrap())
        .collect();
    assert_eq!(orphaned, vec![10, 11]);

    let (_, body) = srv.get("/area", json!({ "parent": 1 })).await;
    assert!(body["response"].as_array().unwrap().is_empty());

    let (status, _) = srv.delete("/area", json!({ "id": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn area_under_missing_parent_is_rejected_and_not_created() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .put("/area", json!({ "id": 5, "name": "bin", "parent": 99 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let res = srv
        .client
        .get(format!("{}/area", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["response"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn reparenting_into_a_descendant_is_rejected() {
    let srv = TestServer::spawn().await;
    seed_area(&srv, 1, None).await;
    seed_area(&srv, 2, Some(1)).await;

    let (status, _) = srv.patch("/area", json!({ "id": 1, "parent": 2 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv.patch("/area", json!({ "id": 2, "parent": null })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["changes"]["parent"], Value::Null);

    let (_, body) = srv.get("/area", json!({ "topLevel": true })).await;
    assert_eq!(body["response"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn tag_lifecycle_and_failed_resolution() {
    let srv = TestServer::spawn().await;
    seed_area(&srv, 1, None).await;

    let (status, body) = srv.put("/tag", json!({ "name": "red" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let red_id = body["created"].as_str().unwrap().to_string();

    let (status, _) = srv.put("/tag", json!({ "name": "red" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = srv
        .put(
            "/item",
            json!({ "id": 1, "name": "Cable", "area": 1, "tags": ["red"], "meta": { "len": 2 } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["changes"]["tags"], json!([red_id]));
    assert_eq!(body["changes"]["quantity"], 1);

    let (status, body) = srv
        .patch("/item", json!({ "id": 1, "tags": ["red", "missing"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Couldn't find tag missing");

    let (status, body) = srv
        .patch("/item", json!({ "id": 1, "meta": { "finish.color": "red" } }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["changes"]["meta"], json!({ "len": 2, "finish": { "color": "red" } }));

    let (_, body) = srv.get("/item", json!({ "tags": ["red"] })).await;
    assert_eq!(body["response"].as_array().unwrap().len(), 1);

    let (status, body) = srv.delete("/tag", json!({ "name": "red" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["detached"], 1);

    let (_, body) = srv.get("/item", json!({ "id": 1 })).await;
    assert_eq!(body["response"][0]["tags"], json!([]));

    let (_, body) = srv.get("/tag", json!({})).await;
    assert!(body["response"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_and_duplicate_requests_use_the_error_envelope() {
    let srv = TestServer::spawn().await;
    seed_area(&srv, 1, None).await;
    seed_item(&srv, 1, 1, 1).await;

    let res = srv
        .client
        .put(format!("{}/item", srv.base_url))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 400);

    let (status, body) = srv
        .put("/item", json!({ "id": 1, "name": "again", "area": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 409);

    let (status, _) = srv
        .put("/item", json!({ "id": 2, "name": "nowhere", "area": 42 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = srv
        .patch("/item", json!({ "id": 1, "quantity": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slow_requests_time_out_with_the_error_envelope() {
    use axum::{Router, routing::get};
    use stockroom_api::middleware::{RequestTimeout, timeout_middleware};

    let app = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "done"
            }),
        )
        .route("/fast", get(|| async { "done" }))
        .layer(axum::middleware::from_fn_with_state(
            RequestTimeout(Duration::from_millis(50)),
            timeout_middleware,
        ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = reqwest::Client::new();

    let res = client.get(format!("{base_url}/slow")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "request timed out");

    let res = client.get(format!("{base_url}/fast")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    handle.abort();
}

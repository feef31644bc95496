//! Integration tests for the Sitebook API.
//!
//! These tests spin up a real server instance and make HTTP requests to verify
//! the complete request/response cycle.

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

use sitebook::api::{AppState, create_router};
use sitebook::config::{AppConfig, FileStorageConfig, StorageBackend, StorageConfig};
use sitebook::storage::create_storage;

// ============================================================================
// Test Harness
// ============================================================================

/// Test server instance.
struct TestServer {
    addr: SocketAddr,
    client: Client,
    _temp_dir: TempDir,
}

impl TestServer {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".parse().unwrap();
        config.storage = StorageConfig {
            backend: StorageBackend::File,
            file: FileStorageConfig {
                data_dir: temp_dir.path().to_path_buf(),
            },
            ..Default::default()
        };
        config.observability.log_level = "warn".to_string();

        let storage = create_storage(&config.storage)
            .await
            .expect("Failed to create storage");

        let state = AppState::new(Arc::new(config), storage).expect("Failed to build state");
        let app = create_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr,
            client: Client::new(),
            _temp_dir: temp_dir,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    async fn post_empty(&self, path: &str) -> Response {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Create a document and return its `data`.
    async fn create(&self, collection: &str, body: Value) -> Value {
        let response = self.post(&format!("/v1/{collection}"), &body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["data"].clone()
    }

    /// Seed two clients and five scopes.
    async fn seed_scopes(&self) -> (String, String) {
        let acme = self
            .create("clients", json!({ "clientName": "Acme Builders" }))
            .await;
        let globex = self
            .create("clients", json!({ "clientName": "Globex" }))
            .await;
        let acme_id = acme["_id"].as_str().unwrap().to_string();
        let globex_id = globex["_id"].as_str().unwrap().to_string();

        let scopes = [
            (&acme_id, "Roofing", "approved", 80),
            (&acme_id, "Plumbing", "draft", 10),
            (&globex_id, "Framing", "approved", 50),
            (&globex_id, "Painting", "review", 30),
            (&acme_id, "Electrical", "approved", 65),
        ];
        for (client, title, status, progress) in scopes {
            self.create(
                "scopes",
                json!({
                    "client": client,
                    "natureOfWork": "renovation",
                    "scopeTitle": title,
                    "status": status,
                    "progress": progress,
                }),
            )
            .await;
        }

        (acme_id, globex_id)
    }
}

async fn data(response: Response) -> Value {
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 0);
    body["data"].clone()
}

fn titles(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["scopeTitle"].as_str().unwrap_or_default().to_string())
        .collect()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new().await;

    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let server = TestServer::new().await;

    let response = server.get("/ready").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["ready"], true);
    assert_eq!(body["data"]["components"]["backend"], "file");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new().await;

    let response = server.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("sitebook_up"));
}

// ============================================================================
// Sequences
// ============================================================================

#[tokio::test]
async fn test_sequence_preview_and_next() {
    let server = TestServer::new().await;

    let preview = data(server.get("/v1/sequences/Invoice/preview?prefix=INV&length=3").await).await;
    assert_eq!(preview["id"], "INV-001");

    let again = data(server.get("/v1/sequences/Invoice/preview?prefix=INV&length=3").await).await;
    assert_eq!(again["id"], "INV-001");

    let next = data(
        server
            .post("/v1/sequences/Invoice/next", &json!({ "prefix": "INV", "length": 3 }))
            .await,
    )
    .await;
    assert_eq!(next["id"], "INV-001");
    assert_eq!(next["name"], "Invoice");

    let preview = data(server.get("/v1/sequences/Invoice/preview?prefix=INV&length=3").await).await;
    assert_eq!(preview["id"], "INV-002");
}

#[tokio::test]
async fn test_sequence_next_without_body_uses_defaults() {
    let server = TestServer::new().await;

    let first = data(server.post_empty("/v1/sequences/Receipt/next").await).await;
    let second = data(server.post_empty("/v1/sequences/Receipt/next").await).await;
    assert_eq!(first["id"], "0001");
    assert_eq!(second["id"], "0002");
}

#[tokio::test]
async fn test_sequence_invalid_length_rejected() {
    let server = TestServer::new().await;

    let response = server
        .get("/v1/sequences/Invoice/preview?prefix=INV&length=0")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 1003);
}

// ============================================================================
// Documents
// ============================================================================

#[tokio::test]
async fn test_create_assigns_sequential_ids() {
    let server = TestServer::new().await;
    let client = server
        .create("clients", json!({ "clientName": "Acme Builders" }))
        .await;
    let client_id = client["_id"].as_str().unwrap();

    let first = server
        .create(
            "scopes",
            json!({ "client": client_id, "natureOfWork": "roofing", "scopeId": "SCP-9999" }),
        )
        .await;
    let second = server
        .create("scopes", json!({ "client": client_id, "natureOfWork": "framing" }))
        .await;

    assert_eq!(first["scopeId"], "SCP-0001");
    assert_eq!(second["scopeId"], "SCP-0002");
    assert!(first["createdAt"].is_string());
    assert!(first.get("__v").is_none());
}

#[tokio::test]
async fn test_create_missing_required_field_does_not_spend_id() {
    let server = TestServer::new().await;

    let response = server
        .post("/v1/scopes", &json!({ "natureOfWork": "roofing" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 3002);

    let preview = data(server.get("/v1/sequences/Scope/preview?prefix=SCP").await).await;
    assert_eq!(preview["id"], "SCP-0001");
}

#[tokio::test]
async fn test_get_populates_relations() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let page = data(server.get("/v1/scopes?scopeTitle=Roofing").await).await;
    let id = page["items"][0]["_id"].as_str().unwrap().to_string();

    let scope = data(server.get(&format!("/v1/scopes/{id}")).await).await;
    assert_eq!(scope["scopeTitle"], "Roofing");
    assert_eq!(scope["client"]["clientName"], "Acme Builders");
}

#[tokio::test]
async fn test_soft_delete_hides_document() {
    let server = TestServer::new().await;
    let client = server
        .create("clients", json!({ "clientName": "Acme Builders" }))
        .await;
    let id = client["_id"].as_str().unwrap();

    let response = server.delete(&format!("/v1/clients/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.get(&format!("/v1/clients/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page = data(server.get("/v1/clients").await).await;
    assert_eq!(page["pagination"]["total"], 0);

    let response = server.delete(&format!("/v1/clients/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_collection() {
    let server = TestServer::new().await;

    let response = server.get("/v1/invoices").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 4002);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_filters() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let page = data(server.get("/v1/scopes?status=approved&sort=scopeTitle").await).await;
    assert_eq!(titles(&page), vec!["Electrical", "Framing", "Roofing"]);

    let page = data(server.get("/v1/scopes?progress[gte]=50&sort=-progress").await).await;
    assert_eq!(titles(&page), vec!["Roofing", "Electrical", "Framing"]);

    let page = data(
        server
            .get("/v1/scopes?status[ne]=approved&sort=progress")
            .await,
    )
    .await;
    assert_eq!(titles(&page), vec!["Plumbing", "Painting"]);
}

#[tokio::test]
async fn test_list_relation_filter() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let page = data(
        server
            .get("/v1/scopes?client[clientName]=Globex&sort=scopeTitle")
            .await,
    )
    .await;
    assert_eq!(titles(&page), vec!["Framing", "Painting"]);
    assert_eq!(page["items"][0]["client"]["clientName"], "Globex");
}

#[tokio::test]
async fn test_list_field_selection() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let page = data(
        server
            .get("/v1/scopes?fields=scopeTitle&fields[client]=clientName&sort=progress&limit=1")
            .await,
    )
    .await;
    let item = page["items"][0].as_object().unwrap();

    assert_eq!(item["scopeTitle"], "Plumbing");
    assert!(item.contains_key("_id"));
    assert!(!item.contains_key("status"));
    assert_eq!(item["client"]["clientName"], "Acme Builders");
}

#[tokio::test]
async fn test_list_pagination_links() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let first = data(server.get("/v1/scopes?sort=progress&limit=2").await).await;
    assert_eq!(titles(&first), vec!["Plumbing", "Painting"]);
    assert_eq!(first["pagination"]["total"], 5);
    assert_eq!(first["pagination"]["pages"], 3);
    assert!(first["pagination"].get("prev").is_none());
    assert_eq!(
        first["pagination"]["next"],
        format!("{}/v1/scopes?sort=progress&page=2&limit=2", server.base_url())
    );

    let last = data(server.get("/v1/scopes?sort=progress&page=3&limit=2").await).await;
    assert_eq!(titles(&last), vec!["Roofing"]);
    assert!(last["pagination"].get("next").is_none());
    assert_eq!(
        last["pagination"]["prev"],
        format!("{}/v1/scopes?sort=progress&page=2&limit=2", server.base_url())
    );
}

#[tokio::test]
async fn test_list_default_order_is_newest_first() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    for path in ["/v1/scopes", "/v1/scopes?sort=-createdAt"] {
        let page = data(server.get(path).await).await;
        let created: Vec<String> = page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["createdAt"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(created.len(), 5, "{path}");
        assert!(
            created.windows(2).all(|pair| pair[0] >= pair[1]),
            "{path}: {created:?}"
        );
    }
}

#[tokio::test]
async fn test_list_page_past_the_end() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let response = server.get("/v1/scopes?sort=progress&page=4&limit=2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = data(response).await;
    assert!(page["items"].as_array().unwrap().is_empty());
    assert_eq!(page["pagination"]["total"], 5);
    assert_eq!(page["pagination"]["pages"], 3);
    assert!(page["pagination"].get("next").is_none());
    assert_eq!(
        page["pagination"]["prev"],
        format!("{}/v1/scopes?sort=progress&page=3&limit=2", server.base_url())
    );
}

#[tokio::test]
async fn test_list_date_range_on_date_only_fields() {
    let server = TestServer::new().await;
    let client = server
        .create("clients", json!({ "clientName": "Acme Builders" }))
        .await;
    let project = server
        .create(
            "projects",
            json!({ "title": "Depot", "client": client["_id"] }),
        )
        .await;
    server
        .create(
            "tasks",
            json!({
                "project": project["_id"],
                "title": "Pour slab",
                "startDate": "2025-03-01",
                "dueDate": "2025-03-10",
            }),
        )
        .await;

    let total = |page: Value| page["pagination"]["total"].clone();

    let page = data(server.get("/v1/tasks?dueDate[lte]=2025-12-31").await).await;
    assert_eq!(total(page), 1);

    let page = data(server.get("/v1/tasks?dueDate[gte]=2025-01-01").await).await;
    assert_eq!(total(page), 1);

    let page = data(server.get("/v1/tasks?dueDate[gte]=2025-03-10T00:00:00Z").await).await;
    assert_eq!(total(page), 1);

    let page = data(server.get("/v1/tasks?dueDate[gt]=2025-03-10").await).await;
    assert_eq!(total(page), 0);
}

#[tokio::test]
async fn test_list_invalid_page() {
    let server = TestServer::new().await;

    for query in ["page=0", "page=abc", "limit=0", "limit=1000"] {
        let response = server.get(&format!("/v1/scopes?{query}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{query}");

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], 3003, "{query}");
    }
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search() {
    let server = TestServer::new().await;
    server.seed_scopes().await;

    let results = data(server.get("/v1/scopes/search?q=roof").await).await;
    assert_eq!(results["results"], 1);
    assert_eq!(results["items"][0]["scopeTitle"], "Roofing");

    let response = server.get("/v1/scopes/search?q=r").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

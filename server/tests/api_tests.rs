use devgate_server::{build_router, AllowResponse, AppState, BlockResponse, PendingResponse};
use devgate_store::{CheckDecision, DeviceSnapshot, DeviceStore, StoreConfig};
use serde_json::json;
use tempfile::TempDir;

const TOKEN: &str = "test-admin-token";

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn check(&self, device_id: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/check"))
            .json(&json!({ "deviceId": device_id }))
            .send()
            .await
            .unwrap()
    }

    async fn admin_post(&self, path: &str, device_id: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/v1/admin{path}")))
            .header("x-admin-token", TOKEN)
            .json(&json!({ "deviceId": device_id }))
            .send()
            .await
            .unwrap()
    }

    async fn list(&self) -> DeviceSnapshot {
        self.client
            .get(self.url("/api/v1/admin/devices"))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// Spin up the HTTP server on an OS-assigned port over a fresh state file.
async fn spawn_test_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("state.json")).with_admin_token(TOKEN);
    let app = build_router(AppState::new(DeviceStore::open(config).unwrap()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

#[tokio::test]
async fn health_endpoint() {
    let server = spawn_test_server().await;
    let resp = reqwest::get(server.url("/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_device_check_is_pending() {
    let server = spawn_test_server().await;
    let resp = server.check("dev1").await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["forceExit"], true);
    assert_eq!(body["intervalSec"], 30);
    assert_eq!(body["reason"], "not allowed");

    server.check("dev1").await;
    assert_eq!(server.list().await.pending, vec!["dev1"]);
}

#[tokio::test]
async fn check_via_query_string() {
    let server = spawn_test_server().await;
    server.admin_post("/allow", "dev1").await;

    let resp = reqwest::get(server.url("/api/v1/check?deviceId=dev1")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let decision: CheckDecision = resp.json().await.unwrap();
    assert!(decision.allowed);
    assert!(!decision.force_exit);
    assert_eq!(decision.reason, "");
}

#[tokio::test]
async fn missing_device_id_is_rejected() {
    let server = spawn_test_server().await;
    for resp in [
        server.check("  ").await,
        reqwest::get(server.url("/api/v1/check")).await.unwrap(),
    ] {
        assert_eq!(resp.status(), 400);
        let decision: CheckDecision = resp.json().await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.force_exit);
        assert_eq!(decision.reason, "missing deviceId");
    }
    assert!(server.list().await.pending.is_empty());
}

#[tokio::test]
async fn blocked_device_check() {
    let server = spawn_test_server().await;
    let resp = server.admin_post("/block", "dev1").await;
    assert_eq!(resp.status(), 200);
    let body: BlockResponse = resp.json().await.unwrap();
    assert_eq!(body.block, vec!["dev1"]);

    let decision: CheckDecision = server.check("dev1").await.json().await.unwrap();
    assert!(!decision.allowed);
    assert!(decision.force_exit);
    assert_eq!(decision.reason, "blocked");
}

#[tokio::test]
async fn operator_flow() {
    let server = spawn_test_server().await;
    server.check("a").await;
    server.check("b").await;
    server.check("c").await;

    let allow: AllowResponse = server.admin_post("/allow", "a").await.json().await.unwrap();
    assert_eq!(allow.allow, vec!["a"]);
    let block: BlockResponse = server.admin_post("/block", "b").await.json().await.unwrap();
    assert_eq!(block.block, vec!["b"]);

    let snapshot = server.list().await;
    assert_eq!(snapshot.pending, vec!["c"]);
    assert_eq!(snapshot.last_seen.len(), 3);

    let allow: AllowResponse = server.admin_post("/unallow", "a").await.json().await.unwrap();
    assert!(allow.allow.is_empty());
    let block: BlockResponse = server.admin_post("/unblock", "b").await.json().await.unwrap();
    assert!(block.block.is_empty());

    let resp = server
        .client
        .post(server.url("/api/v1/admin/pending/clear"))
        .header("x-admin-token", TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let pending: PendingResponse = resp.json().await.unwrap();
    assert!(pending.pending.is_empty());

    let snapshot = server.list().await;
    assert!(snapshot.allow.is_empty());
    assert!(snapshot.block.is_empty());
    assert!(snapshot.pending.is_empty());
    assert_eq!(snapshot.last_seen.len(), 3);
}

#[tokio::test]
async fn device_status_endpoint() {
    let server = spawn_test_server().await;
    server.check("dev1").await;

    let body: serde_json::Value = server
        .client
        .get(server.url("/api/v1/admin/devices/dev1"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["deviceId"], "dev1");
    assert_eq!(body["status"], "pending");
    assert!(body["lastSeen"].is_string());
}

#[tokio::test]
async fn admin_empty_device_is_bad_request() {
    let server = spawn_test_server().await;
    let resp = server.admin_post("/allow", "   ").await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 400);
    assert!(body["error"]["message"].as_str().unwrap().contains("deviceId"));
}

#[tokio::test]
async fn admin_routes_require_token() {
    let server = spawn_test_server().await;

    let resp = server
        .client
        .get(server.url("/api/v1/admin/devices"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(server.url("/api/v1/admin/allow"))
        .header("x-admin-token", "wrong")
        .json(&json!({ "deviceId": "dev1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 401);

    assert!(server.list().await.allow.is_empty());
}

#[tokio::test]
async fn check_needs_no_token() {
    let server = spawn_test_server().await;
    let resp = reqwest::get(server.url("/api/v1/check?deviceId=x")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let server = spawn_test_server().await;
    let resp = reqwest::get(server.url("/api/v1/nonexistent")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn concurrent_allow_and_block_over_http() {
    let server = spawn_test_server().await;
    for round in 0..20 {
        let device = format!("dev{round}");
        let (a, b) = tokio::join!(
            server.admin_post("/allow", &device),
            server.admin_post("/block", &device),
        );
        assert_eq!(a.status(), 200);
        assert_eq!(b.status(), 200);

        let snapshot = server.list().await;
        let in_allow = snapshot.allow.contains(&device);
        let in_block = snapshot.block.contains(&device);
        assert!(in_allow ^ in_block, "{device}: {snapshot:?}");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn admin_reads_alongside_check_traffic() {
    let server = spawn_test_server().await;
    server.admin_post("/allow", "dev0").await;

    let checks = async {
        for i in 0..30 {
            let resp = server.check(&format!("dev{}", i % 5)).await;
            assert_eq!(resp.status(), 200);
        }
    };
    let reads = async {
        for _ in 0..30 {
            let resp = server
                .client
                .get(server.url("/api/v1/admin/devices/dev0"))
                .header("x-admin-token", TOKEN)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
            let body: serde_json::Value = resp.json().await.unwrap();
            assert_eq!(body["status"], "allowed");
        }
    };
    tokio::join!(checks, reads);

    let snapshot = server.list().await;
    assert_eq!(snapshot.allow, vec!["dev0"]);
    assert_eq!(snapshot.pending, vec!["dev1", "dev2", "dev3", "dev4"]);
}

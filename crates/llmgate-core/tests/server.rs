use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use llmgate_core::{
    AppState, ConfigSource, ConfigStore, Dispatcher, UpstreamClient, UpstreamError,
    UpstreamRequest, UpstreamResponse, gateway_router,
};

const CONFIG: &str = r#"{
    "providers": [{"name": "openai", "api_base_url": "https://primary.test/v1/chat/completions",
                   "api_key": "sk-test", "models": ["gpt-3.5-turbo"]}],
    "routing": {"default": "openai,gpt-3.5-turbo"}
}"#;

struct NoUpstream;

#[async_trait]
impl UpstreamClient for NoUpstream {
    async fn send(&self, _req: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        Err(UpstreamError::Connect("no upstream in this test".into()))
    }
}

async fn spawn_gateway() -> SocketAddr {
    let store = Arc::new(ConfigStore::load(ConfigSource::Inline(CONFIG.to_string())).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), Arc::new(NoUpstream)));
    let app = gateway_router(AppState { store, dispatcher });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn root_and_health_answer_liveness_probes() {
    let addr = spawn_gateway().await;
    let client = wreq::Client::builder().build().unwrap();

    for path in ["/", "/health"] {
        let resp = client
            .get(format!("http://{addr}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200, "path {path}");
        let body: serde_json::Value = serde_json::from_slice(&resp.bytes().await.unwrap()).unwrap();
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn unparseable_body_gets_client_dialect_error() {
    let addr = spawn_gateway().await;
    let client = wreq::Client::builder().build().unwrap();

    let resp = client
        .post(format!("http://{addr}/v1/messages"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = serde_json::from_slice(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

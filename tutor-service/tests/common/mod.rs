#![allow(dead_code)]

use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tutor_service::config::TutorConfig;
use tutor_service::services::providers::ChatProvider;
use tutor_service::Application;

pub const TEST_DEPLOYMENT: &str = "itso-gpt";
pub const TEST_CHAT_KEY: &str = "test-chat-key";
pub const TEST_SEARCH_ENDPOINT: &str = "https://itso.search.windows.net";
pub const TEST_SEARCH_KEY: &str = "test-search-key";
pub const TEST_INDEX: &str = "itsospec-index";

/// Complete configuration pointing the chat provider at `chat_endpoint`.
pub fn test_config(chat_endpoint: &str) -> TutorConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("AZURE_OPENAI_ENDPOINT", chat_endpoint.to_string()),
        ("AZURE_OPENAI_API_KEY", TEST_CHAT_KEY.to_string()),
        ("AZURE_OPENAI_DEPLOYMENT", TEST_DEPLOYMENT.to_string()),
        ("AZURE_SEARCH_ENDPOINT", TEST_SEARCH_ENDPOINT.to_string()),
        ("AZURE_SEARCH_API_KEY", TEST_SEARCH_KEY.to_string()),
        ("AZURE_SEARCH_INDEX", TEST_INDEX.to_string()),
        ("TUTOR_PROVIDER_TIMEOUT_SECS", "2".to_string()),
        ("TUTOR_PROVIDER_MAX_RETRIES", "2".to_string()),
        ("TUTOR_PROVIDER_INITIAL_BACKOFF_MS", "1".to_string()),
    ]);

    TutorConfig::from_lookup(Config { port: 0 }, |key| vars.get(key).cloned())
        .expect("Failed to build test config")
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the service around an injected provider.
    pub async fn spawn(provider: Arc<dyn ChatProvider>) -> Self {
        let app = Application::build_with_provider(test_config("http://127.0.0.1:9"), provider)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    /// Spawn the service with the real Azure provider.
    pub async fn spawn_with_config(config: TutorConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    async fn start(app: Application) -> Self {
        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub async fn post_ask(&self, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/ask", self.address))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to send request")
    }
}

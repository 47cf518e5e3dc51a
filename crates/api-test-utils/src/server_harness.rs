//! Test server harness for E2E testing
//!
//! Provides `TestApiServer` for spawning real API server instances in tests,
//! each backed by its own mock JWKS endpoint.

use crate::crypto_fixtures::{jwks_json, TEST_AUDIENCE, TEST_DOMAIN, TEST_KEY_1, TEST_KEY_2};
use api_service::config::Config;
use api_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock JWKS endpoint is served on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Build a test configuration pointing at `jwks_url`.
pub fn test_config(jwks_url: &str) -> Result<Config, anyhow::Error> {
    let vars = HashMap::from([
        ("AUTH0_DOMAIN".to_string(), TEST_DOMAIN.to_string()),
        ("AUTH0_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
        ("JWKS_URL".to_string(), jwks_url.to_string()),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
    ]);

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

/// Test harness for spawning the API server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_missing_token_e2e() -> anyhow::Result<()> {
///     let server = TestApiServer::spawn().await?;
///
///     let response = server.get("/api/test", None).await?;
///
///     assert_eq!(response.status(), 401);
///     assert_eq!(server.jwks_fetch_count().await, 0);
///     Ok(())
/// }
/// ```
pub struct TestApiServer {
    addr: SocketAddr,
    config: Config,
    jwks_server: MockServer,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestApiServer {
    /// Spawn a server whose JWKS endpoint publishes both test keys.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_jwks(
            ResponseTemplate::new(200).set_body_json(jwks_json(&[&TEST_KEY_1, &TEST_KEY_2])),
        )
        .await
    }

    /// Spawn a server whose JWKS endpoint always answers with `response`.
    pub async fn spawn_with_jwks(response: ResponseTemplate) -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&jwks_server)
            .await;

        Self::spawn_against(jwks_server).await
    }

    /// Spawn a server against an already configured JWKS mock.
    ///
    /// Use this when a test needs its own expectations on the endpoint.
    pub async fn spawn_against(jwks_server: MockServer) -> Result<Self, anyhow::Error> {
        let config = test_config(&format!("{}{}", jwks_server.uri(), JWKS_PATH))?;

        let state = Arc::new(AppState::new(config.clone()));
        let app = routes::build_routes(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            // ConnectInfo feeds the request log's source address
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            jwks_server,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the mock JWKS endpoint.
    pub fn jwks_server(&self) -> &MockServer {
        &self.jwks_server
    }

    /// Number of requests the JWKS endpoint has received so far.
    pub async fn jwks_fetch_count(&self) -> usize {
        self.jwks_server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Send a GET to `path`, with `Authorization: Bearer {token}` when given.
    pub async fn get(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let mut request = self.client.get(format!("{}{}", self.url(), path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Send a GET to `path` with a raw `Authorization` header value.
    pub async fn get_with_authorization(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .get(format!("{}{}", self.url(), path))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await?)
    }
}

impl Drop for TestApiServer {
    fn drop(&mut self) {
        // Explicitly abort the HTTP server task to ensure immediate cleanup
        // when the test completes.
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_builders::TestTokenBuilder;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestApiServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let token = TestTokenBuilder::new().build();
        let response = server.get("/api/test", Some(&token)).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["userId"], "user123");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_config_points_at_mock_jwks() -> Result<(), anyhow::Error> {
        let server = TestApiServer::spawn().await?;

        let config = server.config();

        assert_eq!(config.issuer, "https://example.auth0.com/");
        assert_eq!(config.audience, TEST_AUDIENCE);
        assert!(config.jwks_url.starts_with(&server.jwks_server().uri()));
        assert!(config.jwks_url.ends_with(JWKS_PATH));

        Ok(())
    }

    #[tokio::test]
    async fn test_jwks_fetch_count_tracks_fetches() -> Result<(), anyhow::Error> {
        let server = TestApiServer::spawn().await?;
        assert_eq!(server.jwks_fetch_count().await, 0);

        let token = TestTokenBuilder::new().build();
        server.get("/api/test", Some(&token)).await?;

        assert_eq!(server.jwks_fetch_count().await, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_servers_different_ports() -> Result<(), anyhow::Error> {
        let server1 = TestApiServer::spawn().await?;
        let server2 = TestApiServer::spawn().await?;

        assert_ne!(server1.addr(), server2.addr());
        assert_ne!(server1.jwks_server().uri(), server2.jwks_server().uri());

        Ok(())
    }
}

//! HTTP transport for warmup requests.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use prewarm_types::Method;

use crate::error::TransportError;

const USER_AGENT: &str = concat!("prewarm/", env!("CARGO_PKG_VERSION"));

/// A client that sends a single HTTP request to the warmup target.
#[async_trait]
pub trait HttpClient: fmt::Debug + Send + Sync {
    /// Sends a request to `path` on the target.
    ///
    /// Returns `Ok` for any `2xx` response. All other statuses fail with
    /// [`TransportError::UnexpectedStatus`].
    async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Builder to create a [`ReqwestClient`].
#[must_use]
#[derive(Debug)]
pub struct ReqwestClientBuilder {
    base_url: String,
    reqwest_builder: reqwest::ClientBuilder,
}

impl ReqwestClientBuilder {
    /// Accepts invalid TLS certificates from the target when set to `true`.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.reqwest_builder = self.reqwest_builder.danger_accept_invalid_certs(insecure);
        self
    }

    /// Sets both the connect and the total request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.reqwest_builder = self
            .reqwest_builder
            .connect_timeout(timeout)
            .timeout(timeout);
        self
    }

    /// Calls the closure with the underlying [`reqwest::ClientBuilder`].
    pub fn configure_reqwest<F>(mut self, closure: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    {
        self.reqwest_builder = closure(self.reqwest_builder);
        self
    }

    /// Returns a [`ReqwestClient`] that uses this configuration.
    pub fn build(self) -> Result<ReqwestClient, TransportError> {
        Ok(ReqwestClient {
            base_url: self.base_url,
            reqwest: self.reqwest_builder.build()?,
        })
    }
}

/// An [`HttpClient`] backed by [`reqwest`].
///
/// Request paths are resolved against the base URL, so `ping` and `/ping` address the same
/// resource.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    base_url: String,
    reqwest: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new [`ReqwestClientBuilder`] for the target at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ReqwestClientBuilder {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        let reqwest_builder = reqwest::Client::builder().user_agent(USER_AGENT);

        ReqwestClientBuilder {
            base_url,
            reqwest_builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> Result<(), TransportError> {
        let url = self.url(path);

        let mut builder = self.reqwest.request(reqwest_method(method), &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body.to_owned());
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(TransportError::UnexpectedStatus {
            method,
            url,
            status: status.as_u16(),
            text,
        })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Connect => reqwest::Method::CONNECT,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Trace => reqwest::Method::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::routing::any;
    use prewarm_test::server::TestServer;

    use super::*;

    #[tokio::test]
    async fn request_success() {
        let seen = Arc::new(Mutex::new(None));
        let router = Router::new().route(
            "/path",
            any({
                let seen = Arc::clone(&seen);
                move |uri: Uri| async move {
                    *seen.lock().unwrap() = Some(uri.path().to_owned());
                }
            }),
        );
        let server = TestServer::new(router).await;

        let client = ReqwestClient::builder(server.base_url()).build().unwrap();
        client
            .request(Method::Get, "/path", &HashMap::new(), Some(""))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("/path"));
    }

    #[tokio::test]
    async fn request_fails_on_non_2xx() {
        let router = Router::new().fallback(|| async { (StatusCode::FORBIDDEN, "Unauthorized") });
        let server = TestServer::new(router).await;

        let client = ReqwestClient::builder(server.base_url()).build().unwrap();
        let err = client
            .request(Method::Get, "/", &HashMap::new(), Some(""))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "GET {}/ returned 403 Unauthorized, expected 2xx",
                server.base_url()
            )
        );
    }

    #[tokio::test]
    async fn accepts_any_2xx() {
        let router = Router::new().fallback(|| async { StatusCode::NO_CONTENT });
        let server = TestServer::new(router).await;

        let client = ReqwestClient::builder(server.base_url()).build().unwrap();
        client
            .request(Method::Delete, "/anything", &HashMap::new(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sends_method_headers_and_body() {
        type Seen = (String, Option<String>, Bytes);
        let seen: Arc<Mutex<Option<Seen>>> = Arc::new(Mutex::new(None));
        let router = Router::new().route(
            "/db",
            any({
                let seen = Arc::clone(&seen);
                move |method: axum::http::Method, headers: HeaderMap, body: Bytes| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_owned);
                    *seen.lock().unwrap() = Some((method.to_string(), auth, body));
                }
            }),
        );
        let server = TestServer::new(router).await;

        let headers = HashMap::from([("Authorization".to_owned(), "Bearer abc".to_owned())]);
        let client = ReqwestClient::builder(server.base_url())
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        client
            .request(Method::Post, "db", &headers, Some(r#"{"db": "true"}"#))
            .await
            .unwrap();

        let (method, auth, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(method, "POST");
        assert_eq!(auth.as_deref(), Some("Bearer abc"));
        assert_eq!(body.as_ref(), br#"{"db": "true"}"#);
    }

    #[test]
    fn joins_base_url_and_path() {
        let client = ReqwestClient::builder("http://localhost:8080/")
            .build()
            .unwrap();

        assert_eq!(client.url("/"), "http://localhost:8080/");
        assert_eq!(client.url("ping"), "http://localhost:8080/ping");
        assert_eq!(client.url("/ping"), "http://localhost:8080/ping");
    }

    #[tokio::test]
    async fn connection_failure_is_reported() {
        // Nothing listens on the discard port.
        let client = ReqwestClient::builder("http://127.0.0.1:9")
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let err = client
            .request(Method::Get, "/", &HashMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Reqwest(_)));
    }
}

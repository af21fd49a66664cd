//! Exposes an in-process HTTP server that plays the warmup target in integration tests.
//!
//! ```
//! use axum::Router;
//! use axum::routing::get;
//! use prewarm_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new(Router::new().route("/ping", get(|| async { "pong" }))).await;
//!    let url = server.url("/ping");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};

use axum::Router;

/// An in-process HTTP server for use in integration tests.
///
/// The server serves the given [`Router`] on a random available port on localhost and stops when
/// it is dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl TestServer {
    /// Spawns the server onto the current tokio runtime.
    pub async fn new(router: Router) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the base URL of the server, without a trailing slash.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.socket.port())
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

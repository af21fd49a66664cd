//! The warmup target and its readiness checks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use prewarm_types::Method;
use tokio_util::sync::CancellationToken;

use crate::error::TargetError;
use crate::grpc::GrpcClient;
use crate::http::HttpClient;

/// A pair of optional transport clients for the HTTP and gRPC side of the target.
#[derive(Clone, Debug, Default)]
pub struct Clients {
    /// The HTTP client, if the target serves HTTP.
    pub http: Option<Arc<dyn HttpClient>>,
    /// The gRPC client, if the target serves gRPC.
    pub grpc: Option<Arc<dyn GrpcClient>>,
}

/// Options controlling how a [`Target`] waits for readiness.
#[derive(Clone, Debug)]
pub struct TargetOptions {
    /// Path that must answer a `GET` with `2xx` before warmup starts.
    pub readiness_http_path: Option<String>,
    /// gRPC method that must answer an empty message with `OK` before warmup starts.
    pub readiness_grpc_method: Option<String>,
    /// Maximum time to wait for the target to become ready.
    pub readiness_timeout: Duration,
    /// Pause between two failed readiness checks.
    pub readiness_interval: Duration,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            readiness_http_path: None,
            readiness_grpc_method: None,
            readiness_timeout: Duration::from_secs(60),
            readiness_interval: Duration::from_secs(1),
        }
    }
}

/// The service being warmed up.
///
/// A target is only constructed once all configured readiness checks have passed. It owns the
/// transport clients used by a single [`Warmup`](crate::Warmup) session.
#[derive(Debug)]
pub struct Target {
    pub(crate) http: Option<Arc<dyn HttpClient>>,
    pub(crate) grpc: Option<Arc<dyn GrpcClient>>,
}

impl Target {
    /// Waits for the target to become ready and returns it.
    ///
    /// The `readiness` clients run the checks configured in `options`, while the `warmup` clients
    /// are used for the warmup requests afterwards. Fails if the checks do not pass within
    /// [`TargetOptions::readiness_timeout`], or when `cancel` is triggered.
    pub async fn new(
        readiness: Clients,
        warmup: Clients,
        options: &TargetOptions,
        cancel: &CancellationToken,
    ) -> Result<Self, TargetError> {
        let http_check = match (&options.readiness_http_path, readiness.http) {
            (Some(path), Some(client)) => Some((path.as_str(), client)),
            (Some(_), None) => return Err(TargetError::MissingReadinessClient("HTTP")),
            (None, _) => None,
        };
        let grpc_check = match (&options.readiness_grpc_method, readiness.grpc) {
            (Some(method), Some(client)) => Some((method.as_str(), client)),
            (Some(_), None) => return Err(TargetError::MissingReadinessClient("gRPC")),
            (None, _) => None,
        };

        let checks = async {
            if let Some((path, client)) = http_check {
                wait_for_http(client.as_ref(), path, options.readiness_interval).await;
            }
            if let Some((method, client)) = grpc_check {
                wait_for_grpc(client.as_ref(), method, options.readiness_interval).await;
            }
        };

        tokio::select! {
            _ = checks => {}
            _ = tokio::time::sleep(options.readiness_timeout) => {
                return Err(TargetError::ReadinessTimeout(options.readiness_timeout));
            }
            _ = cancel.cancelled() => return Err(TargetError::Cancelled),
        }

        Ok(Self {
            http: warmup.http,
            grpc: warmup.grpc,
        })
    }

    /// Creates a target from warmup clients without checking readiness.
    pub fn unchecked(warmup: Clients) -> Self {
        Self {
            http: warmup.http,
            grpc: warmup.grpc,
        }
    }
}

async fn wait_for_http(client: &dyn HttpClient, path: &str, interval: Duration) {
    let headers = HashMap::new();
    loop {
        match client.request(Method::Get, path, &headers, None).await {
            Ok(()) => {
                tracing::info!(path, "HTTP target is ready");
                return;
            }
            Err(err) => {
                tracing::debug!(error = &err as &dyn std::error::Error, "HTTP target not ready");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn wait_for_grpc(client: &dyn GrpcClient, method: &str, interval: Duration) {
    loop {
        match client.request(method, "", &[]).await {
            Ok(()) => {
                tracing::info!(method, "gRPC target is ready");
                return;
            }
            Err(err) => {
                tracing::debug!(error = &err as &dyn std::error::Error, "gRPC target not ready");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::TransportError;

    /// Fails until it has been called `ready_after` times.
    #[derive(Debug)]
    struct Flaky {
        calls: AtomicUsize,
        ready_after: usize,
    }

    impl Flaky {
        fn new(ready_after: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                ready_after,
            })
        }

        fn call(&self) -> Result<(), TransportError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if calls >= self.ready_after {
                Ok(())
            } else {
                Err(TransportError::Closed)
            }
        }
    }

    #[async_trait]
    impl HttpClient for Flaky {
        async fn request(
            &self,
            _method: Method,
            _path: &str,
            _headers: &HashMap<String, String>,
            _body: Option<&str>,
        ) -> Result<(), TransportError> {
            self.call()
        }
    }

    #[async_trait]
    impl GrpcClient for Flaky {
        async fn request(
            &self,
            _service_method: &str,
            _message: &str,
            _headers: &[String],
        ) -> Result<(), TransportError> {
            self.call()
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn options() -> TargetOptions {
        TargetOptions {
            readiness_http_path: Some("/ready".into()),
            readiness_grpc_method: Some("grpc.health.v1.Health/Check".into()),
            readiness_timeout: Duration::from_secs(10),
            readiness_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_ready() {
        let http = Flaky::new(3);
        let grpc = Flaky::new(2);
        let readiness = Clients {
            http: Some(http.clone()),
            grpc: Some(grpc.clone()),
        };

        Target::new(
            readiness,
            Clients::default(),
            &options(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(http.calls.load(Ordering::SeqCst), 3);
        assert_eq!(grpc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let readiness = Clients {
            http: Some(Flaky::new(usize::MAX)),
            grpc: Some(Flaky::new(1)),
        };

        let result = Target::new(
            readiness,
            Clients::default(),
            &options(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(TargetError::ReadinessTimeout(timeout)) if timeout == Duration::from_secs(10)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn can_be_cancelled() {
        let readiness = Clients {
            http: Some(Flaky::new(usize::MAX)),
            grpc: None,
        };
        let options = TargetOptions {
            readiness_grpc_method: None,
            ..options()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Target::new(readiness, Clients::default(), &options, &cancel).await;
        assert!(matches!(result, Err(TargetError::Cancelled)));
    }

    #[tokio::test]
    async fn requires_readiness_clients() {
        let result = Target::new(
            Clients::default(),
            Clients::default(),
            &options(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(TargetError::MissingReadinessClient("HTTP"))
        ));
    }

    #[tokio::test]
    async fn skips_unconfigured_checks() {
        let http = Flaky::new(usize::MAX);
        let readiness = Clients {
            http: Some(http.clone()),
            grpc: None,
        };

        Target::new(
            readiness,
            Clients::default(),
            &TargetOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }
}

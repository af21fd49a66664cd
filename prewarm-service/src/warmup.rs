//! Concurrent dispatch of warmup requests.
//!
//! A [`Warmup`] session pulls requests from an input stream and sends each of them from its own
//! worker task, with at most [`Options::concurrency`] requests in flight across all dispatches of
//! the session. Every request yields exactly one [`Response`] on the output stream. The output
//! stream ends once the input stream is exhausted and the last worker has delivered its response.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::thread::available_parallelism;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use prewarm_types::{GrpcRequest, RequestSpec};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::concurrency::ConcurrencyLimiter;
use crate::error::{TransportError, WarmupError};
use crate::target::{Clients, Target, TargetOptions};

/// The stream of responses returned by a warmup dispatch.
pub type ResponseStream = ReceiverStream<Response>;

/// Options for a [`Warmup`] session.
#[derive(Clone, Debug)]
pub struct Options {
    /// The maximum number of requests in flight at any time, shared by HTTP and gRPC dispatches.
    ///
    /// Must be between `1` and [`Semaphore::MAX_PERMITS`].
    pub concurrency: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            concurrency: available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

/// The transport a [`Response`] was produced by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// An HTTP request.
    Http,
    /// A gRPC call.
    Grpc,
}

impl RequestKind {
    /// Returns the lowercase name of the transport.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Http => "http",
            RequestKind::Grpc => "grpc",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of a single warmup request.
#[derive(Debug)]
pub struct Response {
    /// The transport that sent the request.
    pub kind: RequestKind,
    /// The error of the request, or `None` if it succeeded.
    pub error: Option<TransportError>,
    /// Time from sending the request until its outcome was known.
    pub duration: Duration,
}

impl Response {
    /// Returns `true` if the request succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A warmup session against a single [`Target`].
#[derive(Debug)]
pub struct Warmup {
    target: Target,
    options: Options,
    limiter: ConcurrencyLimiter,
}

impl Warmup {
    /// Waits for the target to become ready and creates a session for it.
    ///
    /// See [`Target::new`] for how readiness is checked. Fails if the target cannot be constructed
    /// or the options are invalid. No request is dispatched in that case.
    pub async fn new(
        readiness: Clients,
        warmup: Clients,
        options: Options,
        target_options: &TargetOptions,
        cancel: &CancellationToken,
    ) -> Result<Self, WarmupError> {
        validate(&options)?;
        let target = Target::new(readiness, warmup, target_options, cancel).await?;
        Self::with_target(target, options)
    }

    /// Creates a session for an already constructed target.
    pub fn with_target(target: Target, options: Options) -> Result<Self, WarmupError> {
        validate(&options)?;
        let limiter = ConcurrencyLimiter::new(options.concurrency);
        Ok(Self {
            target,
            options,
            limiter,
        })
    }

    /// Sends every HTTP request from `requests` to the target.
    ///
    /// The `headers` are added to every request. If the target has no HTTP client, the returned
    /// stream is empty.
    pub fn http_warmup<S>(&self, headers: HashMap<String, String>, requests: S) -> ResponseStream
    where
        S: Stream<Item = RequestSpec> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(self.options.concurrency);
        let Some(client) = self.target.http.clone() else {
            tracing::warn!("no HTTP client configured, skipping HTTP warmup");
            return ReceiverStream::new(receiver);
        };

        let limiter = self.limiter.clone();
        let headers = Arc::new(headers);

        tokio::spawn(async move {
            let send = move |request: RequestSpec| {
                let client = Arc::clone(&client);
                let headers = Arc::clone(&headers);
                async move {
                    client
                        .request(
                            request.method,
                            &request.path,
                            &headers,
                            request.body.as_deref(),
                        )
                        .await
                }
            };

            let count = dispatch(RequestKind::Http, requests, send, &limiter, &sender).await;
            tracing::debug!(count, "HTTP warmup finished");
        });

        ReceiverStream::new(receiver)
    }

    /// Sends every gRPC request from `requests` to the target.
    ///
    /// The `key: value` headers are added to every call. Once all responses have been delivered,
    /// the gRPC client is closed. If the target has no gRPC client, the returned stream is empty.
    pub fn grpc_warmup<S>(&self, headers: Vec<String>, requests: S) -> ResponseStream
    where
        S: Stream<Item = GrpcRequest> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(self.options.concurrency);
        let Some(client) = self.target.grpc.clone() else {
            tracing::warn!("no gRPC client configured, skipping gRPC warmup");
            return ReceiverStream::new(receiver);
        };

        let limiter = self.limiter.clone();
        let headers = Arc::new(headers);

        tokio::spawn(async move {
            let send = {
                let client = Arc::clone(&client);
                move |request: GrpcRequest| {
                    let client = Arc::clone(&client);
                    let headers = Arc::clone(&headers);
                    async move {
                        client
                            .request(&request.service_method, &request.message, &headers)
                            .await
                    }
                }
            };

            let count = dispatch(RequestKind::Grpc, requests, send, &limiter, &sender).await;
            tracing::debug!(count, "gRPC warmup finished");

            if let Err(err) = client.close().await {
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    "failed to close gRPC client"
                );
            }

            // The output stream ends with this sender, strictly after the client is closed.
            drop(sender);
        });

        ReceiverStream::new(receiver)
    }
}

fn validate(options: &Options) -> Result<(), WarmupError> {
    if options.concurrency == 0 {
        return Err(WarmupError::InvalidOptions(
            "concurrency must be greater than zero",
        ));
    }
    if options.concurrency > Semaphore::MAX_PERMITS {
        return Err(WarmupError::InvalidOptions(
            "concurrency exceeds the maximum number of permits",
        ));
    }
    Ok(())
}

/// Spawns one worker per request and waits until every worker has delivered its response.
///
/// Returns the number of dispatched requests. Dispatch stops early if the consumer drops the
/// response stream.
async fn dispatch<S, F, Fut>(
    kind: RequestKind,
    requests: S,
    send: F,
    limiter: &ConcurrencyLimiter,
    responses: &mpsc::Sender<Response>,
) -> usize
where
    S: Stream,
    F: Fn(S::Item) -> Fut,
    Fut: Future<Output = Result<(), TransportError>> + Send + 'static,
{
    let mut requests = pin!(requests);
    let workers = TaskTracker::new();
    let mut count = 0;

    while let Some(request) = requests.next().await {
        // The output slot is reserved before the permit, so workers holding a permit never wait
        // for the consumer.
        let Ok(slot) = responses.clone().reserve_owned().await else {
            tracing::debug!(%kind, "response stream dropped by consumer, stopping");
            break;
        };
        let permit = match limiter.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::error!(error = &err as &dyn std::error::Error, "limiter closed");
                break;
            }
        };

        let request = send(request);
        count += 1;
        tracing::trace!(%kind, in_flight = limiter.used_permits(), "dispatching request");

        workers.spawn(async move {
            let start = Instant::now();
            let result = request.await;
            let duration = start.elapsed();
            drop(permit);

            let error = result.err();
            match error {
                Some(ref err) => tracing::warn!(
                    %kind,
                    ?duration,
                    error = err as &dyn std::error::Error,
                    "warmup request failed"
                ),
                None => tracing::debug!(%kind, ?duration, "warmup request succeeded"),
            }

            slot.send(Response {
                kind,
                error,
                duration,
            });
        });
    }

    workers.close();
    workers.wait().await;
    count
}

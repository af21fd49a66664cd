//! Runs a complete warmup against the configured target.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use prewarm_service::{
    Clients, GrpcClient, HttpClient, RequestFeed, ReqwestClient, TonicClient, Warmup,
};
use prewarm_types::Render;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::report::Summary;

/// Waits for the target, sends all configured requests and tallies their responses.
///
/// Cancelling `cancel` aborts the readiness checks with an error. Once the warmup has started, it
/// stops consuming responses instead and returns the partial summary.
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<Summary> {
    let http_templates = config.http_templates()?;
    let grpc_templates = config.grpc_templates()?;
    let target_options = config.target_options()?;

    // The warmup closes its gRPC channel when done, so readiness checks get their own clients.
    let readiness = clients(config)?;
    let warmup = Warmup::new(
        readiness,
        clients(config)?,
        config.options(),
        &target_options,
        &cancel,
    )
    .await
    .context("failed to start warmup")?;

    tracing::info!(
        http = http_templates.len(),
        grpc = grpc_templates.len(),
        concurrency = config.concurrency,
        "target ready, starting warmup"
    );

    let start = Instant::now();
    let mut streams = Vec::new();
    if !http_templates.is_empty() {
        let headers: HashMap<_, _> = config.http_headers.clone().into_iter().collect();
        let requests = feed(http_templates, config).into_stream();
        streams.push(warmup.http_warmup(headers, requests));
    }
    if !grpc_templates.is_empty() {
        let requests = feed(grpc_templates, config).into_stream();
        streams.push(warmup.grpc_warmup(config.grpc_headers.clone(), requests));
    }

    let mut responses = futures_util::stream::select_all(streams);
    let mut summary = Summary::default();
    loop {
        tokio::select! {
            response = responses.next() => match response {
                Some(response) => summary.record(&response),
                None => break,
            },
            _ = cancel.cancelled() => {
                tracing::warn!("interrupted, stopping warmup");
                summary.interrupted = true;
                break;
            }
        }
    }

    summary.elapsed = start.elapsed();
    tracing::info!(elapsed = ?summary.elapsed, "warmup finished");
    Ok(summary)
}

fn feed<T>(templates: Vec<T>, config: &Config) -> RequestFeed<T>
where
    T: Render + Send + 'static,
    T::Output: Send + 'static,
{
    let feed = RequestFeed::new(templates).max_duration(config.max_duration);
    match config.max_requests {
        Some(max_requests) => feed.max_requests(max_requests),
        None => feed,
    }
}

fn clients(config: &Config) -> Result<Clients> {
    let http = config
        .http_url
        .as_deref()
        .map(|url| -> Result<Arc<dyn HttpClient>> {
            let client = ReqwestClient::builder(url)
                .insecure(config.insecure)
                .timeout(config.request_timeout)
                .build()
                .with_context(|| format!("failed to create HTTP client for {url}"))?;
            Ok(Arc::new(client))
        })
        .transpose()?;

    let grpc = config
        .grpc_url
        .as_deref()
        .map(|url| -> Result<Arc<dyn GrpcClient>> {
            let client = TonicClient::connect_lazy(url, Some(config.request_timeout))
                .with_context(|| format!("failed to create gRPC client for {url}"))?;
            Ok(Arc::new(client))
        })
        .transpose()?;

    Ok(Clients { http, grpc })
}

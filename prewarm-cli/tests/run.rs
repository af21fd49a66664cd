use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, Uri};
use prewarm_cli::config::{Config, Readiness};
use prewarm_cli::warmup;
use prewarm_test::server::TestServer;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Hits {
    paths: Vec<String>,
    tokens: Vec<Option<String>>,
}

async fn server(hits: &Arc<Mutex<Hits>>) -> TestServer {
    let router = Router::new().fallback({
        let hits = Arc::clone(hits);
        move |uri: Uri, headers: HeaderMap| async move {
            let mut hits = hits.lock().unwrap();
            hits.paths.push(uri.path().to_owned());
            hits.tokens.push(
                headers
                    .get("x-token")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned),
            );

            if uri.path().starts_with("/broken") {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            }
        }
    });
    TestServer::new(router).await
}

#[tokio::test]
async fn warms_up_configured_requests() {
    prewarm_test::tracing::init();

    let hits = Arc::new(Mutex::new(Hits::default()));
    let server = server(&hits).await;

    let config = Config {
        http_url: Some(server.base_url()),
        http_headers: [("x-token".to_owned(), "abc".to_owned())].into(),
        http_requests: vec!["get:/items/{numbers-3}".into(), "delete:/broken".into()],
        concurrency: 2,
        max_requests: Some(6),
        readiness: Readiness {
            http_path: Some("/ready".into()),
            ..Default::default()
        },
        ..Default::default()
    };

    let summary = warmup::run(&config, CancellationToken::new()).await.unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.http.successes, 3);
    assert_eq!(summary.http.failures, 3);
    assert_eq!(summary.grpc.total(), 0);
    assert!(!summary.all_failed());

    let hits = hits.lock().unwrap();
    assert_eq!(hits.paths[0], "/ready");
    assert_eq!(hits.paths.len(), 7);
    // Configured headers are only sent with warmup requests.
    assert_eq!(hits.tokens[0], None);
    assert!(hits.tokens[1..].iter().all(|t| t.as_deref() == Some("abc")));
}

#[tokio::test]
async fn invalid_template_fails_before_sending() {
    let hits = Arc::new(Mutex::new(Hits::default()));
    let server = server(&hits).await;

    let config = Config {
        http_url: Some(server.base_url()),
        http_requests: vec!["get:/fine".into(), "get:".into()],
        ..Default::default()
    };

    let err = warmup::run(&config, CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), r#"invalid HTTP request "get:""#);
    assert!(hits.lock().unwrap().paths.is_empty());
}

#[tokio::test]
async fn cancelled_while_waiting_for_target() {
    let hits = Arc::new(Mutex::new(Hits::default()));
    let server = server(&hits).await;

    let config = Config {
        http_url: Some(server.base_url()),
        http_requests: vec!["get:/".into()],
        readiness: Readiness {
            http_path: Some("/broken/health".into()),
            interval: Duration::from_millis(10),
            ..Default::default()
        },
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    });

    let err = warmup::run(&config, cancel).await.unwrap_err();
    assert_eq!(err.to_string(), "failed to start warmup");
    assert_eq!(
        err.root_cause().to_string(),
        "readiness check cancelled"
    );

    let hits = hits.lock().unwrap();
    assert!(!hits.paths.is_empty());
    assert!(hits.paths.iter().all(|path| path == "/broken/health"));
}

//! Integration tests for the proxy client and the backend built on it.
//!
//! A local listener plays the proxy, answering every request with one canned
//! HTTP reply and keeping the raw requests it saw.

use declutterer::classifier::parse_model_output;
use declutterer::config::ClassifierConfig;
use declutterer::proxy::SECRET_HEADER;
use declutterer::{
    ClassificationResponse, LocalBackend, MoodBackend, MoodMethod, ProxyClient, ProxyError,
    SummaryResponse, ML_MIN_SCORE,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct CannedProxy {
    endpoint: String,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl CannedProxy {
    async fn start(status: &'static str, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let raw = read_request(&mut stream).await;
                seen.lock().unwrap().push(raw);
                let reply = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            endpoint: format!("http://{}/api/hf-proxy", addr),
            requests,
            task,
        }
    }

    fn client(&self) -> ProxyClient {
        ProxyClient::new(
            &self.endpoint,
            Some("s3cret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for CannedProxy {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read one request: headers, then as much body as `content-length` says
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buffer[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn backend_for(proxy: &CannedProxy) -> LocalBackend {
    LocalBackend::new(ClassifierConfig::default(), Some(proxy.client()))
}

#[tokio::test]
async fn test_emotion_call_sends_secret_and_reads_data() {
    let proxy = CannedProxy::start(
        "200 OK",
        r#"{"data":[[{"label":"Sadness","score":0.93},{"label":"joy","score":0.02}]]}"#,
    )
    .await;

    let data = proxy.client().emotion("so sad tonight").await.unwrap();
    assert_eq!(
        parse_model_output(&data, ML_MIN_SCORE).emotion.as_deref(),
        Some("sadness")
    );

    let requests = proxy.requests();
    assert_eq!(requests.len(), 1);
    let raw = &requests[0];
    assert!(raw.starts_with("POST /api/hf-proxy"), "{}", raw);
    assert!(
        raw.to_lowercase().contains(&format!("{}: s3cret", SECRET_HEADER)),
        "{}",
        raw
    );
    assert!(raw.contains(r#""text":"so sad tonight""#), "{}", raw);
    assert!(raw.contains(r#""task":"emotion""#), "{}", raw);
}

#[tokio::test]
async fn test_model_classification_through_backend() {
    let proxy = CannedProxy::start(
        "200 OK",
        r#"{"data":[[{"label":"anger","score":0.81}]]}"#,
    )
    .await;

    let reply = backend_for(&proxy)
        .classify("no lexicon words here", MoodMethod::Ml)
        .await;
    assert_eq!(reply.emotion.as_deref(), Some("anger"));

    // Rules never reach the proxy
    let rules = backend_for(&proxy).classify("so sad", MoodMethod::Rules).await;
    assert_eq!(rules.emotion.as_deref(), Some("sadness"));
    assert_eq!(proxy.requests().len(), 1);
}

#[tokio::test]
async fn test_error_status_is_normalized_to_empty() {
    let proxy = CannedProxy::start("401 Unauthorized", r#"{"error":"bad secret"}"#).await;

    match proxy.client().emotion("sad").await {
        Err(ProxyError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("bad secret"));
        }
        other => panic!("expected status error, got {:?}", other),
    }

    let reply = backend_for(&proxy).classify("sad", MoodMethod::Ml).await;
    assert_eq!(reply, ClassificationResponse::empty());
}

#[tokio::test]
async fn test_reply_without_data_is_missing_data() {
    let proxy = CannedProxy::start("200 OK", r#"{"error":"model loading"}"#).await;

    assert!(matches!(
        proxy.client().summary("Rainy Mornings").await,
        Err(ProxyError::MissingData)
    ));

    let summary = backend_for(&proxy).summarise("Rainy Mornings").await;
    assert_eq!(summary, SummaryResponse::empty());
}

#[tokio::test]
async fn test_summary_call_reads_summary_text() {
    let proxy = CannedProxy::start(
        "200 OK",
        r#"{"data":[{"summary_text":"Slow songs for grey days."}]}"#,
    )
    .await;

    let summary = backend_for(&proxy).summarise("Rainy Mornings").await;
    assert_eq!(summary.summary.as_deref(), Some("Slow songs for grey days."));
    assert!(proxy.requests()[0].contains(r#""task":"summary""#));
}

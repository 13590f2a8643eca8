use proofread_lib::error::ProviderError;
use proofread_lib::{HttpModelClient, ModelClient, ProviderId};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Debug)]
struct Recorded {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Answers one connection per canned response, in order, recording each request.
async fn fake_server(responses: Vec<(u16, Value)>) -> (String, mpsc::UnboundedReceiver<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for (status, reply) in responses {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let target = parts.next().unwrap_or_default().to_string();

            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((key, value)) = line.split_once(':') {
                    headers.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
                }
            }

            let length = headers
                .iter()
                .find(|(key, _)| key == "content-length")
                .and_then(|(_, value)| value.parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0; length];
            reader.read_exact(&mut body).await.unwrap();

            tx.send(Recorded {
                method,
                target,
                headers,
                body: String::from_utf8(body).unwrap(),
            })
            .unwrap();

            let payload = body_text(&reply);
            let response = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                payload.len(),
                payload
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    });

    (format!("http://{}", address), rx)
}

fn body_text(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn client(provider: ProviderId, model: &str, base_url: &str) -> HttpModelClient {
    HttpModelClient::new(provider, "test-key", model, Duration::from_secs(5))
        .unwrap()
        .with_base_url(base_url)
}

#[tokio::test]
async fn openrouter_request_and_envelope() {
    let (base_url, mut requests) = fake_server(vec![(
        200,
        json!({"choices": [{"message": {"role": "assistant", "content": "[]"}}]}),
    )])
    .await;

    let text = client(ProviderId::DeepSeek, "deepseek/deepseek-chat", &base_url)
        .analyze_text("find errors")
        .await
        .unwrap();
    assert_eq!(text, "[]");

    let request = requests.recv().await.unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer test-key"));
    assert!(request.header("http-referer").is_some());
    assert_eq!(request.header("x-title"), Some("Spell & Grammar Checker"));

    let body = request.json();
    assert_eq!(body["model"], "deepseek/deepseek-chat");
    assert_eq!(body["max_tokens"], 4000);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "find errors");
}

#[tokio::test]
async fn openrouter_status_codes_map_to_errors() {
    let (base_url, _requests) = fake_server(vec![
        (401, json!({"error": {"message": "No auth credentials found", "code": 401}})),
        (429, json!({"error": {"message": "slow down", "code": 429}})),
        (500, json!({"error": {"message": "upstream exploded", "code": 500}})),
        (503, json!("")),
    ])
    .await;
    let client = client(ProviderId::DeepSeek, "deepseek/deepseek-chat", &base_url);

    assert_eq!(
        client.analyze_text("x").await,
        Err(ProviderError::InvalidApiKey)
    );
    assert_eq!(client.analyze_text("x").await, Err(ProviderError::RateLimited));
    assert_eq!(
        client.analyze_text("x").await,
        Err(ProviderError::Api {
            status: 500,
            message: "upstream exploded".to_string()
        })
    );
    assert_eq!(
        client.analyze_text("x").await.unwrap_err().to_string(),
        "HTTP 503: Service Unavailable"
    );
}

#[tokio::test]
async fn openrouter_empty_choices_yield_empty_text() {
    let (base_url, _requests) = fake_server(vec![(200, json!({"choices": []}))]).await;

    let text = client(ProviderId::DeepSeek, "deepseek/deepseek-chat", &base_url)
        .analyze_text("x")
        .await
        .unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn openrouter_connection_test_hits_key_endpoint() {
    let (base_url, mut requests) =
        fake_server(vec![(200, json!({"data": {"label": "test"}}))]).await;

    let ok = client(ProviderId::DeepSeek, "deepseek/deepseek-chat", &base_url)
        .test_connection()
        .await
        .unwrap();
    assert!(ok);

    let request = requests.recv().await.unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(request.target, "/auth/key");
}

#[tokio::test]
async fn gemini_request_and_envelope() {
    let (base_url, mut requests) = fake_server(vec![(
        200,
        json!({"candidates": [{"content": {"parts": [{"text": "[{\"word\":\"teh\"}]"}]}}]}),
    )])
    .await;

    let text = client(ProviderId::Gemini, "gemini-2.0-flash", &base_url)
        .analyze_text("find errors")
        .await
        .unwrap();
    assert_eq!(text, "[{\"word\":\"teh\"}]");

    let request = requests.recv().await.unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.target,
        "/gemini-2.0-flash:generateContent?key=test-key"
    );
    let body = request.json();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "find errors");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 4000);
}

#[tokio::test]
async fn gemini_falls_back_when_model_is_unknown() {
    let (base_url, mut requests) = fake_server(vec![
        (
            404,
            json!({"error": {"code": 404, "message": "models/gemini-2.5-flash is not found", "status": "NOT_FOUND"}}),
        ),
        (
            200,
            json!({"candidates": [{"content": {"parts": [{"text": "[]"}]}}]}),
        ),
    ])
    .await;

    let text = client(ProviderId::Gemini, "gemini-2.5-flash", &base_url)
        .analyze_text("x")
        .await
        .unwrap();
    assert_eq!(text, "[]");

    let first = requests.recv().await.unwrap();
    let second = requests.recv().await.unwrap();
    assert!(first.target.starts_with("/gemini-2.5-flash:generateContent"));
    assert!(second.target.starts_with("/gemini-2.0-flash:generateContent"));
}

#[tokio::test]
async fn gemini_connection_test_lists_models() {
    let (base_url, mut requests) = fake_server(vec![
        (200, json!({"models": [{"name": "models/gemini-2.0-flash"}]})),
        (
            400,
            json!({"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}),
        ),
    ])
    .await;
    let client = client(ProviderId::Gemini, "gemini-2.0-flash", &base_url);

    assert_eq!(client.test_connection().await, Ok(true));
    assert_eq!(
        client.test_connection().await,
        Err(ProviderError::InvalidApiKey)
    );

    let request = requests.recv().await.unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(request.target, "/?key=test-key");
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn gemini_quota_errors_do_not_fall_back() {
    let (base_url, _requests) = fake_server(vec![(
        429,
        json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}),
    )])
    .await;

    assert_eq!(
        client(ProviderId::Gemini, "gemini-2.0-flash", &base_url)
            .analyze_text("x")
            .await,
        Err(ProviderError::QuotaExceeded)
    );
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let result = client(
        ProviderId::DeepSeek,
        "deepseek/deepseek-chat",
        &format!("http://{}", address),
    )
    .analyze_text("x")
    .await;
    assert_eq!(result, Err(ProviderError::Network));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let result = HttpModelClient::new(
        ProviderId::DeepSeek,
        "test-key",
        "deepseek/deepseek-chat",
        Duration::from_millis(200),
    )
    .unwrap()
    .with_base_url(format!("http://{}/", address))
    .analyze_text("x")
    .await;
    assert_eq!(result, Err(ProviderError::Timeout));
}

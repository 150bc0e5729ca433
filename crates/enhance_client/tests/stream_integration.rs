//! Integration tests for the streaming client against a minimal in-process
//! HTTP server (no mocks): request shape, fragment order, [DONE], failures.

use enhance_client::{Client, ClientError, Credentials};
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Read one HTTP request (headers plus Content-Length body).
async fn read_request(tcp: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = tcp.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve one request with `status` and the body written in `chunks`, then
/// close. The handle resolves to the raw request text.
async fn spawn_server(status: &'static str, chunks: Vec<&'static str>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut tcp, _) = listener.accept().await.unwrap();
        let request = read_request(&mut tcp).await;
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
            status
        );
        let _ = tcp.write_all(head.as_bytes()).await;
        for chunk in chunks {
            let _ = tcp.write_all(chunk.as_bytes()).await;
            let _ = tcp.flush().await;
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let _ = tcp.shutdown().await;
        request
    });
    (format!("http://127.0.0.1:{}/v1/chat/completions", port), handle)
}

fn credentials() -> Credentials {
    Credentials::new("abc", "gpt-4o-mini")
}

async fn collect(client: &Client, prompt: &str) -> Result<Vec<String>, ClientError> {
    let mut stream = client.stream(prompt, &credentials()).await?;
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        out.push(item?);
    }
    Ok(out)
}

#[tokio::test]
async fn request_carries_bearer_key_model_and_prompt() {
    let (url, server) = spawn_server("200 OK", vec!["data: [DONE]\n\n"]).await;
    let client = Client::with_endpoint(&url).unwrap();

    let fragments = collect(&client, "Summarize the following text:\n\nhi").await.unwrap();
    assert!(fragments.is_empty());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer abc"));
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "model": "gpt-4o-mini",
            "stream": true,
            "messages": [{"role": "user", "content": "Summarize the following text:\n\nhi"}],
        })
    );
}

#[tokio::test]
async fn fragments_arrive_in_order_until_done() {
    let (url, _server) = spawn_server(
        "200 OK",
        vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: {\"choices\":[{\"ind",
            "ex\":0,\"delta\":{\"content\":\", world\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"late\"}}]}\n\n",
        ],
    )
    .await;
    let client = Client::with_endpoint(&url).unwrap();

    let fragments = collect(&client, "hi").await.unwrap();
    assert_eq!(fragments, vec!["", "Hello", ", world"]);
    assert_eq!(fragments.concat(), "Hello, world");
}

#[tokio::test]
async fn non_success_status_fails_before_any_fragment() {
    let (url, _server) = spawn_server(
        "401 Unauthorized",
        vec!["{\"error\":{\"message\":\"Incorrect API key provided\"}}"],
    )
    .await;
    let client = Client::with_endpoint(&url).unwrap();

    let err = match client.stream("hi", &credentials()).await {
        Ok(_) => panic!("stream should not start"),
        Err(e) => e,
    };
    match err {
        ClientError::RequestFailed { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_payload_fails_the_stream() {
    let (url, _server) = spawn_server(
        "200 OK",
        vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: {\"unexpected\":true}\n\n",
            "data: [DONE]\n\n",
        ],
    )
    .await;
    let client = Client::with_endpoint(&url).unwrap();

    let mut stream = client.stream("hi", &credentials()).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "ok");
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::StreamParse(_)));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn body_closed_without_done_ends_cleanly() {
    let (url, _server) = spawn_server(
        "200 OK",
        vec!["data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}"],
    )
    .await;
    let client = Client::with_endpoint(&url).unwrap();

    assert_eq!(collect(&client, "hi").await.unwrap(), vec!["partial"]);
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = Client::with_endpoint(format!("http://127.0.0.1:{}/v1/chat/completions", port)).unwrap();
    let err = collect(&client, "hi").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(err.title(), "Request failed");
}

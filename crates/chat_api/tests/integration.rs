use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use chat_api::{
    await_or_cancel, CancellationSignal, ChatApiClient, ChatApiConfig, ChatApiError,
    ChatRequest, ChatTransport, EventStreamParser, ParsedEvent,
};
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("CHAT_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond {
        status: u16,
        content_type: &'static str,
        chunks: Vec<ResponseChunk>,
    },
    Reset,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_stream(status: u16, frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "text/event-stream",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: data_frames(frames),
        }],
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

fn data_frames(frames: &[&str]) -> Vec<u8> {
    let mut body = String::new();

    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    body.into_bytes()
}

fn client_for(server: &ScriptedServer) -> ChatApiClient {
    ChatApiClient::new(ChatApiConfig::new(&server.base_url)).expect("client")
}

async fn collect_events(
    client: &ChatApiClient,
    message: &str,
    cancellation: Option<&CancellationSignal>,
) -> Result<Vec<ParsedEvent>, ChatApiError> {
    let mut fragments = client
        .open_chat_stream(&ChatRequest::new(message), cancellation)
        .await?;
    let mut parser = EventStreamParser::default();
    let mut events = Vec::new();
    while let Some(fragment) = await_or_cancel(fragments.next(), cancellation).await? {
        events.extend(parser.feed(&fragment?));
    }
    parser.finish();
    Ok(events)
}

#[tokio::test]
async fn stream_integration_successful_completion() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_stream(
        200,
        &[
            r##"{"type":"start"}"##,
            r##"{"type":"chunk","content":"Hel"}"##,
            r##"{"type":"chunk","content":"Hello"}"##,
            r##"{"type":"complete"}"##,
        ],
    )])
    .await;

    let client = client_for(&server);
    let events = collect_events(&client, "hi", None)
        .await
        .expect("stream should succeed");

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], ParsedEvent::Start);
    assert_eq!(events[3], ParsedEvent::Complete);
    assert_eq!(
        events[2],
        ParsedEvent::Chunk {
            content: "Hello".to_string(),
        }
    );

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_split_fragments_are_reassembled() {
    if !allow_local_integration() {
        return;
    }

    let body = data_frames(&[r##"{"type":"chunk","content":"ação"}"##, r##"{"type":"complete"}"##]);
    let cut = body
        .iter()
        .position(|byte| *byte == 0xC3)
        .expect("multi-byte lead")
        + 1;
    let server = ScriptedServer::new(vec![ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: body[..cut].to_vec(),
            },
            ResponseChunk {
                delay_ms: 20,
                bytes: body[cut..].to_vec(),
            },
        ],
    }])
    .await;

    let client = client_for(&server);
    let events = collect_events(&client, "hi", None)
        .await
        .expect("stream should succeed");

    assert_eq!(
        events,
        vec![
            ParsedEvent::Chunk {
                content: "ação".to_string(),
            },
            ParsedEvent::Complete,
        ]
    );

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_missing_complete_is_not_an_error() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_stream(
        200,
        &[r##"{"type":"chunk","content":"partial"}"##],
    )])
    .await;

    let client = client_for(&server);
    let events = collect_events(&client, "hi", None)
        .await
        .expect("transport close is authoritative");

    assert_eq!(
        events,
        vec![ParsedEvent::Chunk {
            content: "partial".to_string(),
        }]
    );

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_non_success_status_fails_without_retry() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(503, r##"{"detail":"overloaded"}"##),
        response_stream(200, &[r##"{"type":"complete"}"##]),
    ])
    .await;

    let client = client_for(&server);
    let error = client
        .open_chat_stream(&ChatRequest::new("hi"), None)
        .await
        .err()
        .expect("stream should fail");

    assert!(matches!(&error, ChatApiError::Status(code, message) if code.as_u16() == 503 && message == "overloaded"));
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_cancellation_during_stream() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: data_frames(&[r##"{"type":"chunk","content":"stream"}"##]),
            },
            ResponseChunk {
                delay_ms: 200,
                bytes: data_frames(&[r##"{"type":"complete"}"##]),
            },
        ],
    }])
    .await;

    let client = Arc::new(client_for(&server));

    let cancellation = Arc::new(AtomicBool::new(false));
    let stream_task = tokio::spawn({
        let client = Arc::clone(&client);
        let cancellation = Arc::clone(&cancellation);
        async move {
            collect_events(&client, "hi", Some(&cancellation)).await
        }
    });

    sleep(Duration::from_millis(120)).await;
    cancellation.store(true, Ordering::Release);

    let result = timeout(Duration::from_secs(5), stream_task)
        .await
        .expect("stream task should resolve")
        .expect("join handle should resolve")
        .expect_err("cancellation should abort stream");

    assert!(matches!(result, ChatApiError::Cancelled));
    server.shutdown();
}

#[tokio::test]
async fn stream_integration_connection_reset_fails_once() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Reset, ScriptedResponse::Reset]).await;

    let client = client_for(&server);
    let result = timeout(Duration::from_secs(10), collect_events(&client, "hi", None))
        .await
        .expect("request should resolve")
        .expect_err("connection reset should surface as failure");

    assert!(matches!(result, ChatApiError::Request(_)));
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn knowledge_areas_are_fetched() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"areas":["Graduação","Pós-graduação"]}"##,
    )])
    .await;

    let client = client_for(&server);
    let areas = client
        .fetch_knowledge_areas()
        .await
        .expect("areas should load");

    assert_eq!(areas.areas, vec!["Graduação", "Pós-graduação"]);
    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
) {
    if read_request_headers(&mut socket).await.is_err() {
        return;
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r##"{"detail":"unexpected request"}"##));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond {
            status,
            content_type,
            chunks,
        } => {
            let headers = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                status_reason(status),
                content_type,
            );

            if socket.write_all(headers.as_bytes()).await.is_err() {
                return;
            }

            for chunk in chunks {
                if chunk.delay_ms > 0 {
                    sleep(Duration::from_millis(chunk.delay_ms)).await;
                }
                let prefix = format!("{:X}\r\n", chunk.bytes.len());
                if socket.write_all(prefix.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&chunk.bytes).await.is_err() {
                    return;
                }
                if socket.write_all(b"\r\n").await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }

            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn read_request_headers(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..n]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            return Ok(());
        }
    }
}

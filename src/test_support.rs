//! In-process stand-ins for the remote analysis service.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use tokio::task::JoinHandle;

/// One multipart field as the service received it.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

struct ServiceState {
    status: StatusCode,
    content_type: &'static str,
    body: String,
    hits: AtomicUsize,
    uploads: Mutex<Vec<ReceivedUpload>>,
}

/// `POST /analyze` endpoint answering every request with a fixed reply.
pub struct MockService {
    addr: SocketAddr,
    state: Arc<ServiceState>,
    server: JoinHandle<()>,
}

impl MockService {
    pub async fn json(status: u16, body: serde_json::Value) -> Self {
        Self::start(status, "application/json", body.to_string()).await
    }

    pub async fn text(status: u16, body: &str) -> Self {
        Self::start(status, "text/plain", body.to_string()).await
    }

    async fn start(status: u16, content_type: &'static str, body: String) -> Self {
        let state = Arc::new(ServiceState {
            status: StatusCode::from_u16(status).unwrap(),
            content_type,
            body,
            hits: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/analyze", post(handle_analyze))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_analyze(
    State(state): State<Arc<ServiceState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.uploads.lock().unwrap().push(ReceivedUpload {
            field: name,
            file_name,
            content_type,
            bytes,
        });
    }

    (
        state.status,
        [(header::CONTENT_TYPE, state.content_type)],
        state.body.clone(),
    )
}

/// Base URL of a loopback port nothing listens on.
pub async fn unreachable_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Base URL of a one-shot endpoint that answers `status` but closes the
/// connection before the promised body is complete.
pub async fn truncated_body_endpoint(status: u16) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        // Drain the upload: multipart ends with the closing boundary, a
        // chunked body with the zero-length chunk.
        while !(request.ends_with(b"--\r\n") || request.ends_with(b"0\r\n\r\n")) {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
        }
        let head = format!(
            "HTTP/1.1 {status} Error\r\ncontent-type: text/plain\r\ncontent-length: 100\r\n\r\npartial"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

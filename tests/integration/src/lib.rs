//! Integration tests for the xrpc client and server.
//!
//! Every test starts its own server on an ephemeral loopback port, so no
//! external process is needed:
//!
//! ```text
//! cargo test -p xrpc-integration
//! ```

use std::net::SocketAddr;
use std::sync::Once;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use xrpc_http::{ClientConfig, MethodRegistry, XmlRpcClient, XmlRpcHttpConfig, XmlRpcHttpService};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// An in-process XML-RPC server bound to a loopback port.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    path: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start serving `registry` with the given HTTP configuration.
    pub async fn start_with(registry: MethodRegistry, config: XmlRpcHttpConfig) -> Result<Self> {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind test listener")?;
        let addr = listener.local_addr()?;
        let path = config.path.clone();
        let service = XmlRpcHttpService::new(registry, config);
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(xrpc_http::serve(listener, service, async {
            rx.await.ok();
        }));

        tracing::debug!(%addr, "test server started");
        Ok(Self {
            addr,
            path,
            shutdown: Some(tx),
            handle,
        })
    }

    /// Start serving `registry` on the default path.
    pub async fn start(registry: MethodRegistry) -> Result<Self> {
        Self::start_with(registry, XmlRpcHttpConfig::default()).await
    }

    /// A client configuration pointing at this server.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            path: self.path.clone(),
            ..ClientConfig::default()
        }
    }

    /// A client with the default configuration pointing at this server.
    #[must_use]
    pub fn client(&self) -> XmlRpcClient {
        XmlRpcClient::new(self.client_config())
    }

    /// Whether `GET /health` still answers `200`.
    pub async fn is_healthy(&self) -> bool {
        let Ok(mut stream) = TcpStream::connect(self.addr).await else {
            return false;
        };
        let request = format!(
            "GET /health HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.addr
        );
        if stream.write_all(request.as_bytes()).await.is_err() {
            return false;
        }
        let mut response = String::new();
        stream.read_to_string(&mut response).await.is_ok()
            && response.starts_with("HTTP/1.1 200")
            && response.contains("\"status\":\"running\"")
    }

    /// Signal shutdown and wait for in-flight connections to drain.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        self.handle.await.context("server task panicked")
    }
}

/// A bare HTTP/1.1 responder that answers each connection with the next
/// canned response and hands back the raw requests it saw.
pub async fn spawn_raw_server(
    responses: Vec<String>,
) -> Result<(SocketAddr, JoinHandle<Vec<String>>)> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let mut requests = Vec::with_capacity(responses.len());
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let Ok(request) = read_request(&mut stream).await else {
                break;
            };
            requests.push(request);
            if stream.write_all(response.as_bytes()).await.is_err() {
                break;
            }
            stream.shutdown().await.ok();
        }
        requests
    });

    Ok((addr, handle))
}

/// Build a canned HTTP response with `Connection: close`.
#[must_use]
pub fn raw_response(status_line: &str, extra_headers: &[&str], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for header in extra_headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str(&format!(
        "Content-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    out
}

/// Read one request: the head plus `Content-Length` bytes of body.
async fn read_request(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await?;
        anyhow::ensure!(n > 0, "connection closed before request head");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await?;
        anyhow::ensure!(n > 0, "connection closed before request body");
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// A canned successful method response carrying `<int>n</int>`.
#[must_use]
pub fn int_response_body(n: i32) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodResponse><params><param>\
         <value><int>{n}</int></value></param></params></methodResponse>"
    )
}

mod test_cookies;
mod test_errors;
mod test_roundtrip;

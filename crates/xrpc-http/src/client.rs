//! An XML-RPC client over plain HTTP/1.1.
//!
//! Each call opens a fresh connection, sends one `POST` and reads the full
//! response before decoding it.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tracing::debug;

use xrpc_core::XrpcConfig;
use xrpc_model::{DateFormatOptions, Fault, Value};
use xrpc_xml::{Deserializer, Serializer, XmlRpcError};

use crate::cookies::CookieJar;

/// The request and response behind a call the server refused.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    /// XML-RPC method name that was called.
    pub method: String,
    /// Request path the call was posted to.
    pub path: String,
    /// The encoded `<methodCall>` document that was sent.
    pub request: Bytes,
    /// Response headers.
    pub headers: http::HeaderMap,
    /// Raw response body.
    pub body: String,
}

/// Errors returned by [`XmlRpcClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered 404: no such endpoint or method.
    #[error("XML-RPC method or endpoint not found (HTTP 404): {} at {}", .0.method, .0.path)]
    NotFound(Box<HttpExchange>),

    /// Any other non-2xx answer.
    #[error("unexpected HTTP status {status} calling {} at {}", .exchange.method, .exchange.path)]
    Status {
        /// The status line.
        status: http::StatusCode,
        /// What was sent and received.
        exchange: Box<HttpExchange>,
    },

    /// Encoding the call or decoding the response failed, or the server sent a fault.
    #[error(transparent)]
    Rpc(#[from] XmlRpcError),

    /// The connection could not be made or broke mid-exchange.
    #[error("transport error: {0}")]
    Transport(String),

    /// The client configuration cannot form a valid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// The fault carried by this error, if the server sent one.
    #[must_use]
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Rpc(e) => e.as_fault(),
            _ => None,
        }
    }

    /// The HTTP exchange behind a non-2xx answer.
    #[must_use]
    pub fn exchange(&self) -> Option<&HttpExchange> {
        match self {
            Self::NotFound(exchange) | Self::Status { exchange, .. } => Some(&**exchange),
            _ => None,
        }
    }
}

/// Where and how an [`XmlRpcClient`] sends calls.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Request path.
    pub path: String,
    /// Extra headers sent with every request.
    pub headers: http::HeaderMap,
    /// Keep a cookie jar across calls.
    pub cookies: bool,
    /// Encoding label written into the XML declaration.
    pub encoding: Option<String>,
    /// How request timestamps are rendered.
    pub date_format: DateFormatOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 80,
            path: "/".to_owned(),
            headers: http::HeaderMap::new(),
            cookies: false,
            encoding: None,
            date_format: DateFormatOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from an `http://host[:port]/path` URL.
    pub fn from_url(url: &str) -> Result<Self, ClientError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| ClientError::InvalidRequest(e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(ClientError::InvalidRequest(format!(
                "only http:// URLs are supported: {url}"
            )));
        }
        let host = uri
            .host()
            .ok_or_else(|| ClientError::InvalidRequest(format!("missing host: {url}")))?;
        Ok(Self {
            host: host.to_owned(),
            port: uri.port_u16().unwrap_or(80),
            path: uri
                .path_and_query()
                .map_or_else(|| "/".to_owned(), |pq| pq.as_str().to_owned()),
            ..Self::default()
        })
    }

    /// Build a configuration that talks to a server started from `config`.
    ///
    /// A wildcard bind address is reached through the loopback interface.
    pub fn from_core(config: &XrpcConfig) -> Result<Self, ClientError> {
        let addr: std::net::SocketAddr = config.gateway_listen.parse().map_err(|_| {
            ClientError::InvalidRequest(format!(
                "invalid gateway address: {}",
                config.gateway_listen
            ))
        })?;
        let host = if addr.ip().is_unspecified() {
            "127.0.0.1".to_owned()
        } else {
            addr.ip().to_string()
        };
        Ok(Self {
            host,
            port: addr.port(),
            path: config.path.clone(),
            encoding: config.encoding.clone(),
            date_format: config.date_format,
            ..Self::default()
        })
    }

    fn authority(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// An XML-RPC client.
///
/// Cloning is cheap; clones share the cookie jar.
#[derive(Debug, Clone)]
pub struct XmlRpcClient {
    config: Arc<ClientConfig>,
    serializer: Serializer,
    cookies: Option<Arc<Mutex<CookieJar>>>,
}

impl XmlRpcClient {
    /// Create a client.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let cookies = config
            .cookies
            .then(|| Arc::new(Mutex::new(CookieJar::new())));
        Self {
            serializer: Serializer::new(config.date_format),
            config: Arc::new(config),
            cookies,
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A snapshot of the cookie jar, when cookies are enabled.
    #[must_use]
    pub fn cookies(&self) -> Option<CookieJar> {
        self.cookies.as_ref().map(|jar| jar.lock().clone())
    }

    /// Call `name` with `params` and return the single result value.
    pub async fn method_call(&self, name: &str, params: &[Value]) -> Result<Value, ClientError> {
        let xml = Bytes::from(
            self.serializer
                .encode_call(name, params, self.config.encoding.as_deref())?,
        );
        let request = self.build_request(xml.clone())?;

        debug!(
            method = name, host = %self.config.host, port = self.config.port,
            "sending XML-RPC call"
        );
        let (status, headers, body) = self.send(request).await?;

        if let Some(jar) = &self.cookies {
            jar.lock().parse_response(&headers);
        }

        if !status.is_success() {
            let exchange = Box::new(HttpExchange {
                method: name.to_owned(),
                path: self.config.path.clone(),
                request: xml,
                headers,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
            debug!(method = name, %status, "XML-RPC call refused");
            return Err(if status == http::StatusCode::NOT_FOUND {
                ClientError::NotFound(exchange)
            } else {
                ClientError::Status { status, exchange }
            });
        }

        Ok(Deserializer::new().decode_response(body.as_ref())?)
    }

    fn build_request(&self, xml: Bytes) -> Result<http::Request<Full<Bytes>>, ClientError> {
        let content_type = match &self.config.encoding {
            Some(enc) => format!("text/xml; charset={enc}"),
            None => "text/xml".to_owned(),
        };
        let mut request = http::Request::builder()
            .method(http::Method::POST)
            .uri(self.config.path.as_str())
            .header(http::header::HOST, self.config.authority())
            .header(http::header::CONTENT_TYPE, content_type)
            .header(http::header::CONTENT_LENGTH, xml.len())
            .header(http::header::USER_AGENT, "xrpc")
            .body(Full::new(xml))
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let headers = request.headers_mut();
        for (name, value) in &self.config.headers {
            headers.append(name.clone(), value.clone());
        }
        if let Some(jar) = &self.cookies {
            jar.lock().compose_request(headers);
        }
        Ok(request)
    }

    async fn send(
        &self,
        request: http::Request<Full<Bytes>>,
    ) -> Result<(http::StatusCode, http::HeaderMap, Bytes), ClientError> {
        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(transport_error)?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(transport_error)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "XML-RPC connection closed with error");
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(transport_error)?;
        let (parts, incoming) = response.into_parts();
        let body = incoming
            .collect()
            .await
            .map_err(transport_error)?
            .to_bytes();
        Ok((parts.status, parts.headers, body))
    }
}

fn transport_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_url_into_config() {
        let config = ClientConfig::from_url("http://example.com:8080/RPC2").expect("valid url");
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/RPC2");
        assert_eq!(config.authority(), "example.com:8080");

        let config = ClientConfig::from_url("http://example.com").expect("valid url");
        assert_eq!(config.port, 80);
        assert_eq!(config.path, "/");
        assert_eq!(config.authority(), "example.com");
    }

    #[test]
    fn test_should_build_config_from_core_config() {
        let core = XrpcConfig {
            gateway_listen: "0.0.0.0:9090".to_owned(),
            path: "/xmlrpc".to_owned(),
            encoding: Some("UTF-8".to_owned()),
            ..XrpcConfig::default()
        };
        let config = ClientConfig::from_core(&core).expect("valid config");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.path, "/xmlrpc");
        assert_eq!(config.encoding.as_deref(), Some("UTF-8"));

        let bad = XrpcConfig {
            gateway_listen: "nowhere".to_owned(),
            ..XrpcConfig::default()
        };
        assert!(ClientConfig::from_core(&bad).is_err());
    }

    #[test]
    fn test_should_reject_unsupported_urls() {
        assert!(matches!(
            ClientConfig::from_url("https://example.com/RPC2"),
            Err(ClientError::InvalidRequest(_))
        ));
        assert!(ClientConfig::from_url("not a url").is_err());
    }

    #[test]
    fn test_should_build_request_with_headers_and_cookies() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-api-version", http::HeaderValue::from_static("2"));
        let client = XmlRpcClient::new(ClientConfig {
            host: "rpc.local".to_owned(),
            port: 9000,
            path: "/xmlrpc".to_owned(),
            headers,
            cookies: true,
            encoding: Some("UTF-8".to_owned()),
            ..ClientConfig::default()
        });
        if let Some(jar) = &client.cookies {
            jar.lock().set("session", "abc");
        }

        let request = client.build_request(Bytes::from_static(b"<x/>")).expect("request");
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        assert_eq!(request.method(), http::Method::POST);
        assert_eq!(request.uri().path(), "/xmlrpc");
        assert_eq!(header("host").as_deref(), Some("rpc.local:9000"));
        assert_eq!(
            header("content-type").as_deref(),
            Some("text/xml; charset=UTF-8")
        );
        assert_eq!(header("content-length").as_deref(), Some("4"));
        assert_eq!(header("x-api-version").as_deref(), Some("2"));
        assert_eq!(header("cookie").as_deref(), Some("session=abc"));
    }

    #[test]
    fn test_should_expose_fault_from_rpc_error() {
        let err = ClientError::from(XmlRpcError::from(Fault::new(3, "bad")));
        assert_eq!(err.as_fault(), Some(&Fault::new(3, "bad")));
        assert!(err.exchange().is_none());
        assert!(ClientError::Transport("reset".to_owned()).as_fault().is_none());
    }

    #[tokio::test]
    async fn test_should_report_connection_failures_as_transport() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let client = XmlRpcClient::new(ClientConfig {
            host: "127.0.0.1".to_owned(),
            port,
            ..ClientConfig::default()
        });
        let err = client.method_call("ping", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{err}");
    }
}

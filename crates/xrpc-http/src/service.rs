//! The XML-RPC HTTP service implementing hyper's `Service` trait.
//!
//! [`XmlRpcHttpService`] handles:
//!
//! 1. Health check interception (`GET /health`)
//! 2. Method and path filtering (`POST` on the configured path only)
//! 3. Request body collection and call decoding
//! 4. Dispatch through the [`MethodRegistry`]
//! 5. Response or fault serialization

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use xrpc_core::XrpcConfig;
use xrpc_model::{DateFormatOptions, Fault};
use xrpc_xml::{Deserializer, Serializer};

use crate::body::RpcBody;
use crate::registry::MethodRegistry;

/// Configuration for the XML-RPC HTTP service.
#[derive(Debug, Clone)]
pub struct XmlRpcHttpConfig {
    /// Request path calls are accepted on.
    pub path: String,
    /// How response timestamps are rendered.
    pub date_format: DateFormatOptions,
}

impl Default for XmlRpcHttpConfig {
    fn default() -> Self {
        Self {
            path: "/RPC2".to_owned(),
            date_format: DateFormatOptions::default(),
        }
    }
}

impl From<&XrpcConfig> for XmlRpcHttpConfig {
    fn from(config: &XrpcConfig) -> Self {
        Self {
            path: config.path.clone(),
            date_format: config.date_format,
        }
    }
}

/// The XML-RPC HTTP service that implements hyper's `Service` trait.
#[derive(Debug, Clone)]
pub struct XmlRpcHttpService {
    registry: Arc<MethodRegistry>,
    config: Arc<XmlRpcHttpConfig>,
    serializer: Serializer,
}

impl XmlRpcHttpService {
    /// Create a service serving `registry`.
    #[must_use]
    pub fn new(registry: MethodRegistry, config: XmlRpcHttpConfig) -> Self {
        let serializer = Serializer::new(config.date_format);
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            serializer,
        }
    }

    /// Handle a request whose body has already been collected.
    pub async fn handle(
        &self,
        method: &http::Method,
        path: &str,
        body: Bytes,
        request_id: &str,
    ) -> http::Response<RpcBody> {
        if is_health_check(method, path) {
            return health_check_response();
        }
        if *method != http::Method::POST {
            debug!(%method, path, request_id, "rejecting non-POST request");
            return method_not_allowed_response();
        }
        if path != self.config.path {
            debug!(path, request_id, "no XML-RPC endpoint at path");
            return empty_response(http::StatusCode::NOT_FOUND);
        }

        let call = match Deserializer::new().decode_call(body.as_ref()) {
            Ok(call) => call,
            Err(err) => {
                warn!(error = %err, request_id, "failed to decode method call");
                let fault = Fault::new(Fault::PARSE_ERROR, err.to_string());
                return self.xml_response(self.serializer.encode_fault(&fault), request_id);
            }
        };

        let method_name = call.name.clone();
        let Some(pending) = self.registry.dispatch(call) else {
            info!(method = %method_name, request_id, "unknown XML-RPC method");
            return empty_response(http::StatusCode::NOT_FOUND);
        };

        let encoded = match pending.await {
            Ok(value) => self.serializer.encode_response(&value),
            Err(fault) => {
                debug!(
                    method = %method_name, code = fault.code, request_id,
                    "handler returned fault"
                );
                self.serializer.encode_fault(&fault)
            }
        };
        self.xml_response(encoded, request_id)
    }

    fn xml_response(
        &self,
        encoded: Result<Vec<u8>, xrpc_xml::XmlRpcError>,
        request_id: &str,
    ) -> http::Response<RpcBody> {
        match encoded {
            Ok(xml) => http::Response::builder()
                .status(http::StatusCode::OK)
                .header(http::header::CONTENT_TYPE, "text/xml")
                .body(RpcBody::from_xml(xml))
                .expect("static XML response should be valid"),
            Err(err) => {
                error!(error = %err, request_id, "failed to serialize response");
                empty_response(http::StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl Service<http::Request<Incoming>> for XmlRpcHttpService {
    type Response = http::Response<RpcBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let (parts, incoming) = req.into_parts();
            debug!(
                method = %parts.method, uri = %parts.uri, request_id,
                "processing XML-RPC request"
            );

            let response = match collect_body(incoming).await {
                Ok(body) => {
                    service
                        .handle(&parts.method, parts.uri.path(), body, &request_id)
                        .await
                }
                Err(err) => {
                    error!(error = %err, request_id, "failed to collect request body");
                    empty_response(http::StatusCode::BAD_REQUEST)
                }
            };

            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Collect the full body from a hyper `Incoming` stream into `Bytes`.
async fn collect_body(incoming: Incoming) -> Result<Bytes, hyper::Error> {
    let collected = incoming.collect().await?;
    Ok(collected.to_bytes())
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == "/health"
}

/// Produce a health check response.
fn health_check_response() -> http::Response<RpcBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(RpcBody::from_string(
            r#"{"status":"running","service":"xmlrpc"}"#,
        ))
        .expect("static health response should be valid")
}

fn method_not_allowed_response() -> http::Response<RpcBody> {
    http::Response::builder()
        .status(http::StatusCode::METHOD_NOT_ALLOWED)
        .header(http::header::ALLOW, "POST")
        .body(RpcBody::empty())
        .expect("static 405 response should be valid")
}

fn empty_response(status: http::StatusCode) -> http::Response<RpcBody> {
    http::Response::builder()
        .status(status)
        .body(RpcBody::empty())
        .expect("static empty response should be valid")
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: http::Response<RpcBody>,
    request_id: &str,
) -> http::Response<RpcBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", hv);
    }
    headers.insert(
        http::header::SERVER,
        http::header::HeaderValue::from_static("xrpc"),
    );

    response
}

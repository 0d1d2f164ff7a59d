//! XML-RPC over HTTP: hyper server service, client, and cookie jar.
//!
//! - **Service** ([`service`]): [`XmlRpcHttpService`] implements hyper's
//!   `Service` trait, decoding `POST` bodies as method calls and answering with
//!   method responses or faults.
//! - **Registry** ([`registry`]): [`MethodRegistry`] maps method names to async
//!   handlers, with an optional fallback for unknown names.
//! - **Client** ([`client`]): [`XmlRpcClient`] sends one call per HTTP/1.1
//!   connection and decodes the reply.
//! - **Cookies** ([`cookies`]): [`CookieJar`] carries `Set-Cookie` values from
//!   responses into later requests.
//! - **Server** ([`server`]): [`serve`], the accept loop with graceful shutdown.
//! - **Body** ([`body`]): [`RpcBody`], the response body type.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> XmlRpcHttpService (hyper Service)
//!     -> Health check / method / path filtering
//!     -> Body collection
//!     -> Deserializer (methodCall)
//!     -> MethodRegistry dispatch
//!     -> Serializer (methodResponse or fault)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use xrpc_http::{MethodRegistry, XmlRpcHttpConfig, XmlRpcHttpService};
//! use xrpc_model::Value;
//!
//! let registry = MethodRegistry::new()
//!     .with_method("echo", |params: Vec<Value>| async move { Ok(Value::Array(params)) });
//! let service = XmlRpcHttpService::new(registry, XmlRpcHttpConfig::default());
//! // Use `service` with hyper server.
//! ```

pub mod body;
pub mod client;
pub mod cookies;
pub mod registry;
pub mod server;
pub mod service;

pub use body::RpcBody;
pub use client::{ClientConfig, ClientError, HttpExchange, XmlRpcClient};
pub use cookies::CookieJar;
pub use registry::{HandlerFuture, MethodRegistry};
pub use server::serve;
pub use service::{XmlRpcHttpConfig, XmlRpcHttpService};

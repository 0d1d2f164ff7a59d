//! Faults, missing methods and HTTP failures as seen by the client.

#[cfg(test)]
mod tests {
    use xrpc_http::{ClientConfig, ClientError, MethodRegistry, XmlRpcClient};
    use xrpc_model::{Fault, MethodCall, Value};

    use crate::{TestServer, raw_response, spawn_raw_server};

    fn registry() -> MethodRegistry {
        MethodRegistry::new().with_method("divide", |params: Vec<Value>| async move {
            let (Some(a), Some(b)) = (
                params.first().and_then(Value::as_i64),
                params.get(1).and_then(Value::as_i64),
            ) else {
                return Err(Fault::new(4, "Too many params."));
            };
            if b == 0 {
                return Err(Fault::new(20, "division by zero"));
            }
            Ok(Value::from(a / b))
        })
    }

    #[tokio::test]
    async fn test_should_surface_handler_fault() {
        let server = TestServer::start(registry()).await.expect("server");
        let client = server.client();

        let ok = client
            .method_call("divide", &[Value::Integer(9), Value::Integer(3)])
            .await
            .expect("divide");
        assert_eq!(ok, Value::Integer(3));

        let err = client
            .method_call("divide", &[Value::Integer(1), Value::Integer(0)])
            .await
            .unwrap_err();
        assert_eq!(err.as_fault(), Some(&Fault::new(20, "division by zero")));

        server.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_unknown_method() {
        let server = TestServer::start(registry()).await.expect("server");
        let err = server
            .client()
            .method_call("multiply", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)), "{err}");
        server.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_should_use_not_found_handler_over_the_wire() {
        let mut reg = registry();
        reg.set_not_found(|call: MethodCall| async move {
            Err(Fault::new(
                Fault::METHOD_NOT_FOUND,
                format!("no method {}", call.name),
            ))
        });
        let server = TestServer::start(reg).await.expect("server");

        let err = server
            .client()
            .method_call("multiply", &[])
            .await
            .unwrap_err();
        assert_eq!(
            err.as_fault(),
            Some(&Fault::new(Fault::METHOD_NOT_FOUND, "no method multiply"))
        );

        server.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_wrong_path() {
        let server = TestServer::start(registry()).await.expect("server");
        let client = XmlRpcClient::new(ClientConfig {
            path: "/elsewhere".to_owned(),
            ..server.client_config()
        });
        let err = client.method_call("divide", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)), "{err}");
        assert_eq!(err.exchange().map(|e| e.path.as_str()), Some("/elsewhere"));
        server.stop().await.expect("stop");
    }

    fn raw_client(addr: std::net::SocketAddr) -> XmlRpcClient {
        XmlRpcClient::new(ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            path: "/RPC2".to_owned(),
            ..ClientConfig::default()
        })
    }

    #[tokio::test]
    async fn test_should_report_unexpected_status_with_exchange() {
        let (addr, requests) = spawn_raw_server(vec![raw_response(
            "500 Internal Server Error",
            &["Retry-After: 30"],
            "try later",
        )])
        .await
        .expect("raw server");

        let err = raw_client(addr)
            .method_call("anything", &[Value::Integer(7)])
            .await
            .unwrap_err();
        let ClientError::Status { status, exchange } = &err else {
            panic!("expected status error, got {err}");
        };
        assert_eq!(*status, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(exchange.method, "anything");
        assert_eq!(exchange.path, "/RPC2");
        assert_eq!(exchange.body, "try later");
        assert_eq!(
            exchange
                .headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok()),
            Some("30")
        );
        let sent = String::from_utf8_lossy(&exchange.request);
        assert!(sent.contains("<methodName>anything</methodName>"));
        assert!(sent.contains("<int>7</int>"));
        assert!(err.to_string().contains("500"));

        let requests = requests.await.expect("raw server task");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].ends_with(&*sent));
    }

    #[tokio::test]
    async fn test_should_report_not_found_with_exchange() {
        let (addr, _requests) = spawn_raw_server(vec![raw_response(
            "404 Not Found",
            &["X-Trace: abc"],
            "no such method",
        )])
        .await
        .expect("raw server");

        let err = raw_client(addr)
            .method_call("missing", &[])
            .await
            .unwrap_err();
        let ClientError::NotFound(exchange) = &err else {
            panic!("expected not found, got {err}");
        };
        assert_eq!(exchange.method, "missing");
        assert_eq!(exchange.path, "/RPC2");
        assert_eq!(exchange.body, "no such method");
        assert_eq!(
            exchange.headers.get("x-trace").and_then(|v| v.to_str().ok()),
            Some("abc")
        );
        assert!(
            String::from_utf8_lossy(&exchange.request)
                .contains("<methodName>missing</methodName>")
        );
    }

    #[tokio::test]
    async fn test_should_report_malformed_response_as_rpc_error() {
        let (addr, _requests) = spawn_raw_server(vec![raw_response(
            "200 OK",
            &[],
            "<methodResponse><params><param><value><int>x</int></value>",
        )])
        .await
        .expect("raw server");
        let client = XmlRpcClient::new(ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..ClientConfig::default()
        });

        let err = client.method_call("anything", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Rpc(_)), "{err}");
        assert!(err.as_fault().is_none());
    }
}

//! Client and server exchanging every value kind.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};
    use xrpc_http::{MethodRegistry, XmlRpcClient, XmlRpcHttpConfig};
    use xrpc_model::{DateFormatOptions, Value};

    use crate::TestServer;

    fn echo_registry() -> MethodRegistry {
        MethodRegistry::new()
            .with_method("echo", |mut params: Vec<Value>| async move {
                Ok(params.pop().unwrap_or_default())
            })
            .with_method("count", |params: Vec<Value>| async move {
                Ok(Value::from(i64::try_from(params.len()).unwrap_or(i64::MAX)))
            })
    }

    fn sample_struct() -> Value {
        let mut members = BTreeMap::new();
        members.insert("name".to_owned(), Value::from("Ada & <Lovelace>"));
        members.insert("age".to_owned(), Value::Integer(36));
        members.insert(
            "tags".to_owned(),
            Value::from(vec![Value::from("math"), Value::Nil, Value::Boolean(true)]),
        );
        Value::Struct(members)
    }

    #[tokio::test]
    async fn test_should_echo_every_value_kind() {
        let server = TestServer::start_with(
            echo_registry(),
            XmlRpcHttpConfig {
                date_format: DateFormatOptions::utc(),
                ..XmlRpcHttpConfig::default()
            },
        )
        .await
        .expect("server");
        let client = XmlRpcClient::new(xrpc_http::ClientConfig {
            date_format: DateFormatOptions::utc(),
            ..server.client_config()
        });

        let samples = vec![
            Value::Nil,
            Value::Boolean(false),
            Value::Integer(-42),
            Value::BigInteger("9007199254740993".to_owned()),
            Value::Double(3.25),
            Value::from(""),
            Value::from("plain text"),
            Value::from("needs <cdata> & escaping"),
            Value::from("tricky ]]> terminator <"),
            Value::from(vec![0u8, 1, 2, 254, 255]),
            Value::from(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap()),
            Value::Array(vec![]),
            Value::empty_struct(),
            sample_struct(),
            Value::from(vec![sample_struct(), Value::from(vec![Value::Integer(1)])]),
        ];

        for sample in samples {
            let echoed = client
                .method_call("echo", std::slice::from_ref(&sample))
                .await
                .expect("echo call");
            assert_eq!(echoed, sample, "value should survive the round trip");
        }

        server.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_should_send_all_params() {
        let server = TestServer::start(echo_registry()).await.expect("server");
        let client = server.client();

        let count = client
            .method_call("count", &[Value::Integer(1), Value::from("two"), Value::Nil])
            .await
            .expect("count call");
        assert_eq!(count, Value::Integer(3));

        let none = client.method_call("count", &[]).await.expect("count call");
        assert_eq!(none, Value::Integer(0));

        server.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_should_serve_concurrent_calls() {
        let server = TestServer::start(echo_registry()).await.expect("server");
        let client = server.client();

        let calls = (0..32).map(|i| {
            let client = client.clone();
            async move { client.method_call("echo", &[Value::Integer(i)]).await }
        });
        let results = futures::future::join_all(calls).await;

        for (i, result) in (0..32).zip(results) {
            assert_eq!(result.expect("echo call"), Value::Integer(i));
        }

        server.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_should_serve_custom_path_with_declared_encoding() {
        let server = TestServer::start_with(
            echo_registry(),
            XmlRpcHttpConfig {
                path: "/xmlrpc".to_owned(),
                ..XmlRpcHttpConfig::default()
            },
        )
        .await
        .expect("server");
        let client = XmlRpcClient::new(xrpc_http::ClientConfig {
            encoding: Some("UTF-8".to_owned()),
            ..server.client_config()
        });

        let echoed = client
            .method_call("echo", &[Value::from("héllo wörld")])
            .await
            .expect("echo call");
        assert_eq!(echoed, Value::from("héllo wörld"));

        server.stop().await.expect("stop");
    }

    fn nested_arrays(depth: usize) -> Value {
        let mut value = Value::Integer(0);
        for _ in 0..depth {
            value = Value::Array(vec![value]);
        }
        value
    }

    #[tokio::test]
    async fn test_should_survive_deeply_nested_calls() {
        let server = TestServer::start(echo_registry()).await.expect("server");
        let client = server.client();
        let deep = nested_arrays(200_000);

        let count = client
            .method_call("count", std::slice::from_ref(&deep))
            .await
            .expect("deep call should be served");
        assert_eq!(count, Value::Integer(1));

        let err = client
            .method_call("no.such.method", std::slice::from_ref(&deep))
            .await
            .unwrap_err();
        assert!(matches!(err, xrpc_http::ClientError::NotFound(_)), "{err}");

        assert!(server.is_healthy().await, "server should keep answering");
        server.stop().await.expect("stop");
    }
}

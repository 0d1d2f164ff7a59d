//! Cookie persistence across client calls.

#[cfg(test)]
mod tests {
    use xrpc_http::{ClientConfig, XmlRpcClient};
    use xrpc_model::Value;

    use crate::{int_response_body, raw_response, spawn_raw_server};

    fn request_header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
        request
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    #[tokio::test]
    async fn test_should_send_back_cookies_from_previous_response() {
        let (addr, requests) = spawn_raw_server(vec![
            raw_response(
                "200 OK",
                &[
                    "Set-Cookie: session=abc123; Path=/; HttpOnly",
                    "Set-Cookie: stale=1; Max-Age=0",
                ],
                &int_response_body(1),
            ),
            raw_response("200 OK", &[], &int_response_body(2)),
        ])
        .await
        .expect("raw server");

        let client = XmlRpcClient::new(ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            path: "/RPC2".to_owned(),
            cookies: true,
            ..ClientConfig::default()
        });

        assert_eq!(
            client.method_call("login", &[]).await.expect("first call"),
            Value::Integer(1)
        );
        let jar = client.cookies().expect("cookies enabled");
        assert_eq!(jar.get("session"), Some("abc123"));

        assert_eq!(
            client.method_call("whoami", &[]).await.expect("second call"),
            Value::Integer(2)
        );

        let requests = requests.await.expect("raw server task");
        assert_eq!(requests.len(), 2);
        assert_eq!(request_header(&requests[0], "cookie"), None);
        assert_eq!(request_header(&requests[1], "cookie"), Some("session=abc123"));
        assert!(requests[1].contains("<methodName>whoami</methodName>"));
    }

    #[tokio::test]
    async fn test_should_ignore_cookies_when_disabled() {
        let (addr, requests) = spawn_raw_server(vec![
            raw_response(
                "200 OK",
                &["Set-Cookie: session=abc123"],
                &int_response_body(1),
            ),
            raw_response("200 OK", &[], &int_response_body(2)),
        ])
        .await
        .expect("raw server");

        let client = XmlRpcClient::new(ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..ClientConfig::default()
        });
        client.method_call("a", &[]).await.expect("first call");
        client.method_call("b", &[]).await.expect("second call");

        assert!(client.cookies().is_none());
        let requests = requests.await.expect("raw server task");
        assert_eq!(request_header(&requests[1], "cookie"), None);
    }
}

//! Routing, health, and middleware integration tests.

#[cfg(test)]
mod tests {
    use staticproxy_core::GatewayConfig;
    use staticproxy_store::MemoryObject;

    use crate::{TestGateway, http_client};

    const RULES: &str = r"
defaults:
  s3_region: us-east-1
handlers:
  - host: 127.0.0.1
    path_prefix: /static/
    s3_bucket: first
    s3_prefix: /assets/
  - path_prefix: /static/
    s3_bucket: second
  - host: public.example.com
    path_prefix: /
    gcs_bucket: public
";

    #[tokio::test]
    async fn test_should_answer_health_check() {
        let gateway = TestGateway::start("", GatewayConfig::default()).await;
        let resp = http_client()
            .get(gateway.url("/healthz"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 200);
        assert!(resp.headers().contains_key("x-request-id"));
        assert_eq!(resp.text().await.expect("body"), "ok");
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_dispatch_to_first_matching_rule() {
        let gateway = TestGateway::start(RULES, GatewayConfig::default()).await;
        gateway
            .bucket("first")
            .insert("assets/a.txt", MemoryObject::new("text/plain", "from first"));
        gateway
            .bucket("second")
            .insert("static/a.txt", MemoryObject::new("text/plain", "from second"));

        let resp = http_client()
            .get(gateway.url("/static/a.txt"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.expect("body"), "from first");
        assert!(gateway.bucket("second").calls().is_empty());
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_return_404_for_unknown_route() {
        let gateway = TestGateway::start(RULES, GatewayConfig::default()).await;
        let resp = http_client()
            .get(gateway.url("/nowhere"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 404);
        let body = resp.text().await.expect("body");
        assert!(body.starts_with("No route for host 127.0.0.1"));
        assert!(!body.contains("headers:"));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_echo_request_on_miss_in_debug_mode() {
        let config = GatewayConfig::builder().debug(true).build();
        let gateway = TestGateway::start(RULES, config).await;
        let resp = http_client()
            .get(gateway.url("/nowhere?probe=1"))
            .header("x-trace-me", "yes")
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 404);
        let body = resp.text().await.expect("body");
        assert!(body.contains("query: probe=1"));
        assert!(body.contains("x-trace-me: yes"));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_route_by_forwarded_host_when_trusted() {
        let config = GatewayConfig::builder().trust_forwarded_host(true).build();
        let gateway = TestGateway::start(RULES, config).await;
        gateway
            .bucket("public")
            .insert("index.txt", MemoryObject::new("text/plain", "public"));

        let resp = http_client()
            .get(gateway.url("/index.txt"))
            .header("x-forwarded-host", "public.example.com")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.expect("body"), "public");
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_ignore_forwarded_host_by_default() {
        let gateway = TestGateway::start(RULES, GatewayConfig::default()).await;
        let resp = http_client()
            .get(gateway.url("/index.txt"))
            .header("x-forwarded-host", "public.example.com")
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 404);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_non_get_methods() {
        let gateway = TestGateway::start(RULES, GatewayConfig::default()).await;
        let resp = http_client()
            .delete(gateway.url("/static/a.txt"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 404);
        gateway.stop().await;
    }
}

//! Response cache integration tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use staticproxy_core::GatewayConfig;
    use staticproxy_store::MemoryObject;

    use crate::{TestGateway, http_client};

    const RULES: &str = r"
handlers:
  - path_prefix: /
    gcs_bucket: cached
";

    #[tokio::test]
    async fn test_should_serve_repeat_requests_from_cache() {
        let config = GatewayConfig::builder().cache_enabled(true).build();
        let gateway = TestGateway::start(RULES, config).await;
        let store = gateway.bucket("cached");
        store.insert("page.html", MemoryObject::new("text/html", "<p>hi</p>"));

        let client = http_client();
        for _ in 0..3 {
            let resp = client
                .get(gateway.url("/page.html"))
                .send()
                .await
                .expect("request");
            assert_eq!(resp.status(), 200);
            assert_eq!(resp.headers()["content-type"], "text/html");
            assert_eq!(resp.text().await.expect("body"), "<p>hi</p>");
        }

        assert_eq!(store.calls(), vec!["get page.html".to_owned()]);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_key_cache_by_query() {
        let config = GatewayConfig::builder().cache_enabled(true).build();
        let gateway = TestGateway::start(RULES, config).await;
        let store = gateway.bucket("cached");
        store.insert("a.txt", MemoryObject::new("text/plain", "a"));

        let client = http_client();
        for query in ["", "?v=1", "?v=2"] {
            let resp = client
                .get(gateway.url(&format!("/a.txt{query}")))
                .send()
                .await
                .expect("request");
            assert_eq!(resp.status(), 200);
        }

        assert_eq!(store.calls().len(), 3);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_not_cache_errors() {
        let config = GatewayConfig::builder().cache_enabled(true).build();
        let gateway = TestGateway::start(RULES, config).await;
        let store = gateway.bucket("cached");

        let client = http_client();
        let first = client
            .get(gateway.url("/late.txt"))
            .send()
            .await
            .expect("request");
        assert_eq!(first.status(), 404);

        store.insert("late.txt", MemoryObject::new("text/plain", "here now"));
        let second = client
            .get(gateway.url("/late.txt"))
            .send()
            .await
            .expect("request");
        assert_eq!(second.status(), 200);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_refetch_after_ttl() {
        let config = GatewayConfig::builder()
            .cache_enabled(true)
            .cache_ttl(Duration::from_millis(50))
            .build();
        let gateway = TestGateway::start(RULES, config).await;
        let store = gateway.bucket("cached");
        store.insert("t.txt", MemoryObject::new("text/plain", "t"));

        let client = http_client();
        client.get(gateway.url("/t.txt")).send().await.expect("request");
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.get(gateway.url("/t.txt")).send().await.expect("request");

        assert_eq!(store.calls().len(), 2);
        gateway.stop().await;
    }
}

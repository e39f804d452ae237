//! Gateway tests against a real S3-compatible server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use aws_sdk_s3::primitives::ByteStream;
    use bytes::Bytes;
    use staticproxy_core::{BackendSpec, GatewayConfig};
    use staticproxy_store::s3::S3Store;
    use staticproxy_store::{ObjectStore, StoreConnector, StoreResult};

    use crate::{http_client, start_with};

    fn endpoint_url() -> String {
        std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:9000".to_owned())
    }

    fn s3_client() -> aws_sdk_s3::Client {
        let creds = Credentials::new("test", "test", None, None, "integration-test");
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(creds)
            .endpoint_url(endpoint_url())
            .force_path_style(true)
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }

    /// Binds every S3 rule to a client with static test credentials.
    struct StaticCredentialConnector {
        client: aws_sdk_s3::Client,
    }

    #[async_trait]
    impl StoreConnector for StaticCredentialConnector {
        async fn connect(&self, spec: &BackendSpec) -> StoreResult<Arc<dyn ObjectStore>> {
            Ok(Arc::new(S3Store::from_client(
                self.client.clone(),
                spec.bucket(),
            )))
        }
    }

    async fn create_bucket(client: &aws_sdk_s3::Client, prefix: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
        let bucket = format!("test-{prefix}-{id}");
        client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("create_bucket");
        bucket
    }

    async fn put(client: &aws_sdk_s3::Client, bucket: &str, key: &str, body: &'static [u8]) {
        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("text/plain")
            .cache_control("max-age=60")
            .metadata("origin", "integration")
            .body(ByteStream::from(Bytes::from_static(body)))
            .send()
            .await
            .expect("put_object");
    }

    async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
        if let Ok(listing) = client.list_objects_v2().bucket(bucket).send().await {
            for object in listing.contents() {
                if let Some(key) = object.key() {
                    let _ = client.delete_object().bucket(bucket).key(key).send().await;
                }
            }
        }
        let _ = client.delete_bucket().bucket(bucket).send().await;
    }

    fn rules(bucket: &str) -> String {
        format!(
            "handlers:\n  - path_prefix: /site/\n    s3_bucket: {bucket}\n    s3_prefix: /www/\n    autoindex: true\n    index_files: [index.html]\n"
        )
    }

    #[tokio::test]
    #[ignore = "requires running S3-compatible server"]
    async fn test_should_serve_object_from_s3() {
        let client = s3_client();
        let bucket = create_bucket(&client, "serve").await;
        put(&client, &bucket, "www/hello.txt", b"hello from s3").await;

        let connector = StaticCredentialConnector {
            client: client.clone(),
        };
        let (addr, shutdown, task) =
            start_with(&rules(&bucket), GatewayConfig::default(), &connector).await;

        let resp = http_client()
            .get(format!("http://{addr}/site/hello.txt"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/plain");
        assert_eq!(resp.headers()["cache-control"], "max-age=60");
        assert_eq!(resp.headers()["x-amz-meta-origin"], "integration");
        assert!(resp.headers().contains_key("etag"));
        assert!(resp.headers().contains_key("last-modified"));
        assert_eq!(resp.text().await.expect("body"), "hello from s3");

        let missing = http_client()
            .get(format!("http://{addr}/site/absent.txt"))
            .send()
            .await
            .expect("request");
        assert_eq!(missing.status(), 404);

        let _ = shutdown.send(());
        let _ = task.await;
        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running S3-compatible server"]
    async fn test_should_resolve_index_and_listing_from_s3() {
        let client = s3_client();
        let bucket = create_bucket(&client, "index").await;
        put(&client, &bucket, "www/docs/index.html", b"<h1>docs</h1>").await;
        put(&client, &bucket, "www/files/a.txt", b"a").await;
        put(&client, &bucket, "www/files/sub/b.txt", b"b").await;

        let connector = StaticCredentialConnector {
            client: client.clone(),
        };
        let (addr, shutdown, task) =
            start_with(&rules(&bucket), GatewayConfig::default(), &connector).await;

        let index = http_client()
            .get(format!("http://{addr}/site/docs/"))
            .send()
            .await
            .expect("request");
        assert_eq!(index.status(), 200);
        assert_eq!(index.text().await.expect("body"), "<h1>docs</h1>");

        let listing = http_client()
            .get(format!("http://{addr}/site/files/"))
            .send()
            .await
            .expect("request");
        assert_eq!(listing.status(), 200);
        let html = listing.text().await.expect("body");
        assert!(html.contains("href=\"sub/\""));
        assert!(html.contains("href=\"a.txt\""));
        assert!(html.contains("1 bytes"));

        let _ = shutdown.send(());
        let _ = task.await;
        cleanup_bucket(&client, &bucket).await;
    }
}

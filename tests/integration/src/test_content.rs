//! Content resolution integration tests.

#[cfg(test)]
mod tests {
    use staticproxy_core::GatewayConfig;
    use staticproxy_store::MemoryObject;

    use crate::{TestGateway, http_client};

    const RULES: &str = r"
handlers:
  - path_prefix: /static/
    s3_bucket: site
    s3_prefix: /assets/
  - path_prefix: /browse/
    s3_bucket: site
    s3_prefix: /assets/
    autoindex: true
  - path_prefix: /docs/
    s3_bucket: site
    s3_prefix: /docs/
    index_files: [index.html, index.htm]
";

    async fn start() -> TestGateway {
        TestGateway::start(RULES, GatewayConfig::default()).await
    }

    #[tokio::test]
    async fn test_should_serve_object_with_metadata_headers() {
        let gateway = start().await;
        let mut object = MemoryObject::new("image/png", vec![1u8, 2, 3]);
        object.attributes.cache_control = Some("public, max-age=300".to_owned());
        object.attributes.etag = Some("\"abc\"".to_owned());
        object
            .attributes
            .user_metadata
            .insert("origin".to_owned(), "upload".to_owned());
        gateway.bucket("site").insert("assets/img.png", object);

        let resp = http_client()
            .get(gateway.url("/static/img.png"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 200);
        let headers = resp.headers();
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(headers["cache-control"], "public, max-age=300");
        assert_eq!(headers["etag"], "\"abc\"");
        assert_eq!(headers["x-amz-meta-origin"], "upload");
        assert_eq!(headers["last-modified"], "Tue, 14 Nov 2023 22:13:20 GMT");
        assert_eq!(headers["content-length"], "3");
        assert!(!headers.contains_key("content-range"));
        assert_eq!(resp.bytes().await.expect("body").as_ref(), &[1, 2, 3]);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_return_404_for_missing_object() {
        let gateway = start().await;
        let resp = http_client()
            .get(gateway.url("/static/img.png"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 404);
        assert_eq!(
            gateway.bucket("site").calls(),
            vec!["get assets/img.png".to_owned()]
        );
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_deny_directory_without_autoindex() {
        let gateway = start().await;
        let resp = http_client()
            .get(gateway.url("/static/"))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 403);
        assert!(resp
            .text()
            .await
            .expect("body")
            .contains("directory listing was denied"));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_render_listing_when_autoindex_enabled() {
        let gateway = start().await;
        let site = gateway.bucket("site");
        site.insert("assets/b.css", MemoryObject::new("text/css", "b"));
        site.insert("assets/a.js", MemoryObject::new("text/javascript", "aa"));
        site.insert("assets/img/logo.png", MemoryObject::new("image/png", "p"));

        let resp = http_client()
            .get(gateway.url("/browse/"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/html; charset=utf-8");
        let html = resp.text().await.expect("body");
        assert!(html.contains("Index of /browse/"));
        let img = html.find("href=\"img/\"").expect("prefix");
        let a = html.find("href=\"a.js\"").expect("a.js");
        let b = html.find("href=\"b.css\"").expect("b.css");
        assert!(img < a && a < b);
        assert!(html.contains("2 bytes"));
        assert_eq!(site.calls(), vec!["list assets/".to_owned()]);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_serve_first_existing_index_file() {
        let gateway = start().await;
        let site = gateway.bucket("site");
        site.insert("docs/guide/index.htm", MemoryObject::new("text/html", "htm"));

        let resp = http_client()
            .get(gateway.url("/docs/guide/"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.expect("body"), "htm");
        assert_eq!(
            site.calls(),
            vec![
                "head docs/guide/index.html".to_owned(),
                "head docs/guide/index.htm".to_owned(),
                "get docs/guide/index.htm".to_owned(),
            ]
        );
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_redirect_directory_marker_to_trailing_slash() {
        let gateway = start().await;
        let mut marker = MemoryObject::new("application/x-directory", "");
        marker.attributes.is_prefix_marker = true;
        gateway.bucket("site").insert("docs/guide", marker);

        let resp = http_client()
            .get(gateway.url("/docs/guide?tab=2"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 307);
        assert_eq!(resp.headers()["location"], "/docs/guide/?tab=2");
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_follow_website_redirect() {
        let gateway = start().await;
        let mut object = MemoryObject::new("text/html", "old");
        object.attributes.website_redirect_location = Some("/static/new.html".to_owned());
        object.attributes.etag = Some("\"old\"".to_owned());
        gateway.bucket("site").insert("assets/old.html", object);

        let resp = http_client()
            .get(gateway.url("/static/old.html"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 307);
        assert_eq!(resp.headers()["location"], "/static/new.html");
        assert!(!resp.headers().contains_key("etag"));
        assert!(!resp.headers().contains_key("content-type"));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_answer_204_for_empty_object() {
        let gateway = start().await;
        gateway
            .bucket("site")
            .insert("assets/empty.txt", MemoryObject::new("text/plain", ""));

        let resp = http_client()
            .get(gateway.url("/static/empty.txt"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 204);
        assert!(resp
            .headers()
            .get("content-length")
            .is_none_or(|v| v == "0"));
        assert!(resp.bytes().await.expect("body").is_empty());
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_pass_through_partial_content() {
        let gateway = start().await;
        let mut object = MemoryObject::new("application/octet-stream", vec![9u8; 100]);
        object.attributes.content_range = Some("bytes 0-99/200".to_owned());
        gateway.bucket("site").insert("assets/blob.bin", object);

        let resp = http_client()
            .get(gateway.url("/static/blob.bin"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 206);
        assert_eq!(resp.headers()["content-range"], "bytes 0-99/200");
        assert_eq!(resp.bytes().await.expect("body").as_ref(), &[9u8; 100][..]);
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_surface_backend_error_status_and_request_id() {
        let gateway = start().await;
        gateway
            .bucket("site")
            .fail_key("assets/secret.txt", 403, "AccessDenied");

        let resp = http_client()
            .get(gateway.url("/static/secret.txt"))
            .send()
            .await
            .expect("request");

        assert_eq!(resp.status(), 403);
        let body = resp.text().await.expect("body");
        assert!(body.contains("AccessDenied"));
        assert!(body.contains("Request ID: mem-"));
        gateway.stop().await;
    }

    #[tokio::test]
    async fn test_should_abort_connection_on_mid_stream_failure() {
        let gateway = start().await;
        let mut object = MemoryObject::new("text/plain", "partial");
        object.attributes.content_length = None;
        object.fail_mid_stream = true;
        gateway.bucket("site").insert("assets/broken.txt", object);

        let resp = http_client()
            .get(gateway.url("/static/broken.txt"))
            .send()
            .await
            .expect("headers are sent");

        assert_eq!(resp.status(), 200);
        assert!(resp.bytes().await.is_err());
        gateway.stop().await;
    }
}

//! Content resolution.
//!
//! Given an object key produced by route rewriting, decide what to send:
//!
//! 1. A key that is empty or ends in `/` is a directory. Index files are
//!    probed in declared order and the first that exists is served. If none
//!    exists the listing is rendered when autoindex is on, otherwise `403`.
//! 2. A file is fetched. A website redirect attribute yields `307` to that
//!    location. A directory marker requested without a trailing slash yields
//!    `307` to the same path with one. Otherwise present attributes become
//!    headers, a zero length yields `204`, a backend content range yields
//!    `206`, and the body is streamed.
//! 3. A listing is rendered as HTML, sub-prefixes first, in backend order.

use askama::Template;
use http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LANGUAGE, CONTENT_LENGTH,
    CONTENT_RANGE, CONTENT_TYPE, ETAG, EXPIRES, HeaderName, HeaderValue, LAST_MODIFIED,
};
use http::{Response, StatusCode};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use staticproxy_core::RuleOptions;
use staticproxy_store::{DirectoryListing, ObjectAttributes, ObjectStore, StoreError};
use tokio::time::Instant;
use tracing::{debug, error};

use crate::body::ProxyBody;
use crate::response::{
    TEXT_HTML, empty_response, redirect_response, set_optional_header,
    set_optional_timestamp_header, text_response,
};

/// Body of the `403` sent for a directory with no index and no autoindex.
pub const DIRECTORY_DENIED: &str =
    "Could not find a valid index file. Additionally, directory listing was denied.\n";

const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const VERSION_ID: HeaderName = HeaderName::from_static("x-amz-version-id");

/// Resolves object keys for one matched request.
#[derive(Debug)]
pub struct ContentResolver<'a> {
    store: &'a dyn ObjectStore,
    options: &'a RuleOptions,
    request_path: &'a str,
    query: Option<&'a str>,
    deadline: Option<Instant>,
}

impl<'a> ContentResolver<'a> {
    /// A resolver over `store` for a request to `request_path`.
    #[must_use]
    pub fn new(store: &'a dyn ObjectStore, options: &'a RuleOptions, request_path: &'a str) -> Self {
        Self {
            store,
            options,
            request_path,
            query: None,
            deadline: None,
        }
    }

    /// The request query, carried over on trailing-slash redirects.
    #[must_use]
    pub fn with_query(mut self, query: Option<&'a str>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    /// Deadline applied to a streamed body.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Produce the response for `key`.
    pub async fn resolve(&self, key: &str) -> Response<ProxyBody> {
        if !is_directory(key) {
            return self.serve_file(key).await;
        }

        for index_file in &self.options.index_files {
            let candidate = format!("{key}{index_file}");
            match self.store.head_object(&candidate).await {
                Ok(true) => {
                    debug!(key = %candidate, "index file found");
                    return self.serve_file(&candidate).await;
                }
                Ok(false) => {}
                Err(err) => return store_error_response(&err, &candidate),
            }
        }

        if self.options.autoindex_enabled() {
            self.serve_listing(key).await
        } else {
            debug!(key, "no index file and autoindex denied");
            text_response(StatusCode::FORBIDDEN, DIRECTORY_DENIED)
        }
    }

    async fn serve_file(&self, key: &str) -> Response<ProxyBody> {
        let object = match self.store.get_object(key).await {
            Ok(object) => object,
            Err(err) => return store_error_response(&err, key),
        };
        let attrs = &object.attributes;

        if let Some(location) = attrs
            .website_redirect_location
            .as_deref()
            .filter(|l| !l.is_empty())
        {
            debug!(key, location, "website redirect");
            return redirect_response(location);
        }

        if attrs.is_prefix_marker && !self.request_path.ends_with('/') {
            let location = match self.query {
                Some(query) => format!("{}/?{query}", self.request_path),
                None => format!("{}/", self.request_path),
            };
            debug!(key, location = %location, "directory marker, redirecting to trailing slash");
            return redirect_response(&location);
        }

        if attrs.content_length == Some(0) {
            let mut response = empty_response(StatusCode::NO_CONTENT);
            copy_attributes(response.headers_mut(), attrs);
            return response;
        }

        let status = if attrs.content_range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };
        let length = attrs.content_length;
        let content_range = attrs.content_range.clone();

        let mut response = Response::new(ProxyBody::empty());
        *response.status_mut() = status;
        let headers = response.headers_mut();
        copy_attributes(headers, attrs);
        set_optional_header(headers, CONTENT_RANGE, content_range.as_deref());
        if let Some(length) = length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }

        *response.body_mut() = ProxyBody::stream(object.body, key, length, self.deadline);
        response
    }

    async fn serve_listing(&self, key: &str) -> Response<ProxyBody> {
        let listing = match self.store.list_objects(key, "/").await {
            Ok(listing) => listing,
            Err(err) => return store_error_response(&err, key),
        };

        match render_listing(self.request_path, &listing) {
            Ok(html) => {
                let mut response = Response::new(ProxyBody::from_string(html));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML));
                response
            }
            Err(e) => {
                error!(key, error = %e, "failed to render directory listing");
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to render directory listing\n",
                )
            }
        }
    }
}

fn is_directory(key: &str) -> bool {
    key.is_empty() || key.ends_with('/')
}

/// Copy every present attribute to its response header.
fn copy_attributes(headers: &mut http::HeaderMap, attrs: &ObjectAttributes) {
    set_optional_header(headers, CACHE_CONTROL, attrs.cache_control.as_deref());
    set_optional_header(headers, CONTENT_DISPOSITION, attrs.content_disposition.as_deref());
    set_optional_header(headers, CONTENT_ENCODING, attrs.content_encoding.as_deref());
    set_optional_header(headers, CONTENT_LANGUAGE, attrs.content_language.as_deref());
    set_optional_header(headers, CONTENT_TYPE, attrs.content_type.as_deref());
    set_optional_header(headers, ETAG, attrs.etag.as_deref());
    set_optional_header(headers, EXPIRES, attrs.expires.as_deref());
    set_optional_timestamp_header(headers, LAST_MODIFIED, attrs.last_modified.as_ref());
    set_optional_header(headers, VERSION_ID, attrs.version_id.as_deref());

    for (key, value) in &attrs.user_metadata {
        let Ok(name) = HeaderName::from_bytes(format!("x-amz-meta-{key}").as_bytes()) else {
            debug!(key, "skipping metadata key that is not a valid header name");
            continue;
        };
        set_optional_header(headers, name, Some(value));
    }
}

/// Translate a store failure into a response, logging it.
///
/// Not-found is expected and logged at debug. Everything else is logged at
/// error with the backend's code and request id, which also appear in the
/// body.
fn store_error_response(err: &StoreError, key: &str) -> Response<ProxyBody> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);

    match err {
        StoreError::NotFound { .. } => {
            debug!(key, "object not found");
            return text_response(status, "Not Found\n");
        }
        StoreError::Backend {
            status: backend_status,
            code,
            request_id,
            ..
        } => error!(
            key,
            backend_status = ?backend_status,
            backend_code = %code,
            backend_request_id = request_id.as_deref().unwrap_or(""),
            error = %err,
            "backend request failed"
        ),
        _ => error!(key, error = %err, "backend request failed"),
    }

    let body = match err.request_id() {
        Some(id) => format!("{err} Request ID: {id}\n"),
        None => format!("{err}\n"),
    };
    text_response(status, body)
}

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingPage<'a> {
    title: &'a str,
    prefixes: Vec<ListingLink<'a>>,
    entries: Vec<ListingLink<'a>>,
    is_truncated: bool,
}

struct ListingLink<'a> {
    href: String,
    name: &'a str,
    size: u64,
}

impl<'a> ListingLink<'a> {
    fn new(name: &'a str, size: u64) -> Self {
        Self {
            href: utf8_percent_encode(name, HREF).to_string(),
            name,
            size,
        }
    }
}

/// Render a listing as an HTML page.
///
/// Names and the title are escaped by the template; hrefs are
/// percent-encoded first.
pub fn render_listing(request_path: &str, listing: &DirectoryListing) -> askama::Result<String> {
    ListingPage {
        title: request_path,
        prefixes: listing
            .prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| ListingLink::new(p, 0))
            .collect(),
        entries: listing
            .entries
            .iter()
            .filter(|e| !e.name.is_empty())
            .map(|e| ListingLink::new(&e.name, e.size))
            .collect(),
        is_truncated: listing.is_truncated,
    }
    .render()
}

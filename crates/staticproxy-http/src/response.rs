//! Response construction helpers.

use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, LOCATION};
use http::{HeaderMap, Response, StatusCode};

use crate::body::ProxyBody;

/// `Content-Type` of plain-text responses.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
/// `Content-Type` of directory listings.
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

/// A plain-text response.
#[must_use]
pub fn text_response(status: StatusCode, body: impl Into<String>) -> Response<ProxyBody> {
    let mut response = Response::new(ProxyBody::from_string(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    response
}

/// A bodiless response with only a status.
#[must_use]
pub fn empty_response(status: StatusCode) -> Response<ProxyBody> {
    let mut response = Response::new(ProxyBody::empty());
    *response.status_mut() = status;
    response
}

/// A `307 Temporary Redirect` to `location`.
///
/// A location that is not a valid header value yields a 500.
#[must_use]
pub fn redirect_response(location: &str) -> Response<ProxyBody> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = empty_response(StatusCode::TEMPORARY_REDIRECT);
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(_) => {
            tracing::error!(location, "redirect target is not a valid header value");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid redirect location\n",
            )
        }
    }
}

/// Set a header if the value is present and non-empty.
pub fn set_optional_header(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        if let Ok(hv) = HeaderValue::from_str(v) {
            headers.insert(name, hv);
        }
    }
}

/// Set an HTTP-date header from a timestamp, skipping the zero time.
pub fn set_optional_timestamp_header(
    headers: &mut HeaderMap,
    name: HeaderName,
    value: Option<&DateTime<Utc>>,
) {
    if let Some(v) = value.filter(|v| v.timestamp() > 0) {
        let formatted = format_http_date(v);
        if let Ok(hv) = HeaderValue::from_str(&formatted) {
            headers.insert(name, hv);
        }
    }
}

/// Format a timestamp as an IMF-fixdate.
#[must_use]
pub fn format_http_date(value: &DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

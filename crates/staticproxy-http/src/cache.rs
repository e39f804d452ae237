//! Optional in-memory response cache.
//!
//! Whole responses (status, headers, body) are cached by effective host,
//! path, and query. Only `200`, `204`, `206`, and `307` responses whose body
//! size is known and within the configured limit are stored. Entries expire
//! after the TTL. Concurrent misses for the same key each fetch from the
//! backend; the last one to finish wins the slot.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use lru::LruCache;
use parking_lot::Mutex;
use staticproxy_core::GatewayConfig;
use tracing::{debug, warn};

use crate::body::ProxyBody;
use crate::middleware::RequestContext;
use crate::response::text_response;

#[derive(Debug, Clone)]
struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    stored_at: Instant,
}

/// A bounded LRU of rendered responses.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CachedResponse>>,
    ttl: Duration,
    max_entry_bytes: u64,
}

impl ResponseCache {
    /// Create a cache holding up to `capacity` responses. `None` when the
    /// capacity is zero.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration, max_entry_bytes: u64) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            max_entry_bytes,
        })
    }

    /// Create the cache described by `config`, if it is enabled.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Option<Self> {
        if !config.cache_enabled {
            return None;
        }
        Self::new(
            config.cache_capacity,
            config.cache_ttl,
            config.cache_max_entry_bytes,
        )
    }

    /// Cache key for a request.
    #[must_use]
    pub fn key(ctx: &RequestContext) -> String {
        format!("{}{}", ctx.host.to_ascii_lowercase(), ctx.path_and_query())
    }

    /// Number of live and expired entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh copy of the cached response for `key`, if present and not
    /// expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Response<ProxyBody>> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key)?.stored_at.elapsed() >= self.ttl;
        if expired {
            entries.pop(key);
            return None;
        }
        let cached = entries.get(key)?.clone();
        drop(entries);

        let mut response = Response::new(ProxyBody::from_bytes(cached.body));
        *response.status_mut() = cached.status;
        *response.headers_mut() = cached.headers;
        Some(response)
    }

    /// Store `response` under `key` when it qualifies, returning a response
    /// equivalent to the one given.
    ///
    /// A qualifying streamed body is read to completion first. If reading it
    /// fails, nothing is cached and a `502` is returned instead.
    pub async fn store(&self, key: String, response: Response<ProxyBody>) -> Response<ProxyBody> {
        if !is_cacheable(response.status()) {
            return response;
        }
        let hint = response.body().size_hint();
        let fits = hint
            .upper()
            .is_some_and(|upper| upper <= self.max_entry_bytes);
        if !fits {
            debug!(key = %key, "response too large or of unknown size, not caching");
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read body for caching");
                return text_response(StatusCode::BAD_GATEWAY, "Failed to read object body\n");
            }
        };

        self.entries.lock().put(
            key,
            CachedResponse {
                status: parts.status,
                headers: parts.headers.clone(),
                body: bytes.clone(),
                stored_at: Instant::now(),
            },
        );
        Response::from_parts(parts, ProxyBody::from_bytes(bytes))
    }
}

fn is_cacheable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK
            | StatusCode::NO_CONTENT
            | StatusCode::PARTIAL_CONTENT
            | StatusCode::TEMPORARY_REDIRECT
    )
}

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cw_core::TARGET_WEB_REQUEST;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: usize,
}

/// Fixed-window request counter per client.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    trusted_proxy_hops: usize,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trusted_proxy_hops: 0,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Number of reverse proxies in front of the server. With zero the
    /// peer address is the client and `X-Forwarded-For` is ignored.
    pub fn with_trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    /// Count a request from `client`. `Err` carries the time until the
    /// window resets.
    pub async fn check(&self, client: &str, now: Instant) -> Result<(), Duration> {
        let mut clients = self.clients.lock().await;
        if !clients.contains_key(client) {
            prune_expired(&mut clients, now, self.window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            return Err(self.window.saturating_sub(now.duration_since(entry.started)));
        }
        entry.count += 1;
        Ok(())
    }
}

fn prune_expired(clients: &mut HashMap<String, Window>, now: Instant, window: Duration) {
    clients.retain(|_, w| now.duration_since(w.started) < window);
}

/// Address of the client as seen through `trusted_hops` proxies.
///
/// Each trusted proxy appends the address it received the request from, so
/// the client is the entry `trusted_hops` from the right of
/// `X-Forwarded-For`. Entries further left are written by the client and
/// are never used. With a shorter header the leftmost entry wins.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let peer = peer.map(|addr| addr.ip().to_string());
    if trusted_hops == 0 {
        return peer.unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    forwarded
        .iter()
        .rev()
        .nth(trusted_hops - 1)
        .or_else(|| forwarded.first())
        .map(|v| v.to_string())
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer, limiter.trusted_proxy_hops);

    match limiter.check(&client, Instant::now()).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            debug!(target: TARGET_WEB_REQUEST, "Rate limited {}", client);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "message": RATE_LIMIT_MESSAGE })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use {
    axum::{
        extract::{ConnectInfo, Request, State},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    dashmap::DashMap,
    tokio::{task::JoinHandle, time::Instant},
    tracing::{debug, warn},
    venom_config::ThrottleConfig,
};

use crate::error::ApiError;

/// Bucket for requests that arrive without a peer address.
const UNKNOWN_PEER: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Lower bound on the reaper period; `interval` rejects zero.
const MIN_REAP_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address.
///
/// A window opens on the first request from an address and admits
/// `max_requests` requests until `window` has elapsed; the next request after
/// that opens a fresh window. Rejected requests still count.
pub struct RequestThrottle {
    window: Duration,
    max_requests: u32,
    windows: DashMap<IpAddr, Window>,
}

impl RequestThrottle {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(cfg: &ThrottleConfig) -> Self {
        Self::new(cfg.window(), cfg.max_requests)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request from `addr`; false once the address is over its cap.
    pub fn check(&self, addr: IpAddr) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(addr).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        entry.count = entry.count.saturating_add(1);
        entry.count <= self.max_requests
    }

    /// Drop windows that have already rolled over. Returns how many went.
    pub fn reap(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Reap expired windows once per window length (at least
    /// [`MIN_REAP_PERIOD`]), forever.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let throttle = Arc::clone(self);
        let period = self.window.max(MIN_REAP_PERIOD);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = throttle.reap();
                if removed > 0 {
                    debug!(removed, "reaped throttle windows");
                }
            }
        })
    }
}

fn peer_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(UNKNOWN_PEER)
}

pub async fn throttle_requests(
    State(throttle): State<Arc<RequestThrottle>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = peer_ip(&request);
    if throttle.check(ip) {
        next.run(request).await
    } else {
        warn!(%ip, "request throttled");
        ApiError::RateLimited.into_response()
    }
}

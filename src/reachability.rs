//! Cached internet reachability.
//!
//! A [`ReachabilityCache`] is created once per process and shared by `Arc`
//! with every controller that gates on the network. Positive results are
//! trusted for the freshness window; negative results are never reused.

use crate::config::ReachabilityConfig;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A live reachability check.
pub trait Probe: Send + Sync {
    /// `true` if the network is reachable right now.
    fn probe(&self) -> bool;
}

/// Probes HTTP endpoints in order, succeeding on the first that answers.
///
/// Any HTTP response, including an error status, proves reachability.
pub struct HttpProbe {
    endpoints: Vec<String>,
    agent: ureq::Agent,
}

impl HttpProbe {
    /// Probe `endpoints`, each bounded by `timeout`.
    #[must_use]
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .redirects(0)
            .build();
        Self { endpoints, agent }
    }

    /// Probe configured from [`ReachabilityConfig`].
    #[must_use]
    pub fn from_config(config: &ReachabilityConfig) -> Self {
        Self::new(config.endpoints.clone(), config.probe_timeout())
    }

    fn probe_endpoint(&self, url: &str) -> bool {
        match self.agent.head(url).call() {
            Ok(_) | Err(ureq::Error::Status(_, _)) => true,
            Err(ureq::Error::Transport(e)) => {
                tracing::debug!("reachability probe to {url} failed: {e}");
                false
            }
        }
    }
}

impl Probe for HttpProbe {
    fn probe(&self) -> bool {
        self.endpoints.iter().any(|url| self.probe_endpoint(url))
    }
}

#[derive(Debug, Clone, Copy)]
struct ReachabilityState {
    reachable: bool,
    checked_at: Instant,
}

/// Memoized, time-bounded reachability check.
pub struct ReachabilityCache {
    probe: Box<dyn Probe>,
    freshness: Duration,
    state: Mutex<Option<ReachabilityState>>,
}

impl ReachabilityCache {
    /// Cache wrapping `probe`, trusting positive results for `freshness`.
    #[must_use]
    pub fn new(probe: Box<dyn Probe>, freshness: Duration) -> Self {
        Self {
            probe,
            freshness,
            state: Mutex::new(None),
        }
    }

    /// Cache with an [`HttpProbe`] built from `config`.
    #[must_use]
    pub fn from_config(config: &ReachabilityConfig) -> Self {
        Self::new(Box::new(HttpProbe::from_config(config)), config.freshness())
    }

    /// Run a live probe, bypassing and not updating the cache.
    #[must_use]
    pub fn probe(&self) -> bool {
        self.probe.probe()
    }

    /// Whether the network is reachable, using the cache when it is fresh and positive.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.is_reachable_at(Instant::now())
    }

    /// [`is_reachable`](Self::is_reachable) evaluated at `now`.
    #[must_use]
    pub fn is_reachable_at(&self, now: Instant) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let fresh_positive = (*state).is_some_and(|cached| {
            cached.reachable && now.saturating_duration_since(cached.checked_at) < self.freshness
        });
        if fresh_positive {
            tracing::debug!("reachability cache hit");
            return true;
        }

        let reachable = self.probe.probe();
        tracing::debug!(reachable, "reachability probed");
        *state = Some(ReachabilityState {
            reachable,
            checked_at: now,
        });
        reachable
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        answer: Arc<AtomicBool>,
    }

    impl Probe for CountingProbe {
        fn probe(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.load(Ordering::SeqCst)
        }
    }

    fn cache(answer: bool) -> (ReachabilityCache, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let answer = Arc::new(AtomicBool::new(answer));
        let probe = CountingProbe {
            calls: Arc::clone(&calls),
            answer: Arc::clone(&answer),
        };
        (
            ReachabilityCache::new(Box::new(probe), Duration::from_secs(60)),
            calls,
            answer,
        )
    }

    #[test]
    fn first_query_probes() {
        let (cache, calls, _) = cache(true);
        assert!(cache.is_reachable_at(Instant::now()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fresh_positive_result_is_reused() {
        let (cache, calls, _) = cache(true);
        let t0 = Instant::now();
        assert!(cache.is_reachable_at(t0));
        assert!(cache.is_reachable_at(t0 + Duration::from_secs(30)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_positive_result_is_reprobed() {
        let (cache, calls, answer) = cache(true);
        let t0 = Instant::now();
        assert!(cache.is_reachable_at(t0));

        answer.store(false, Ordering::SeqCst);
        assert!(!cache.is_reachable_at(t0 + Duration::from_secs(90)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn negative_result_is_never_trusted() {
        let (cache, calls, answer) = cache(false);
        let t0 = Instant::now();
        assert!(!cache.is_reachable_at(t0));
        assert!(!cache.is_reachable_at(t0));

        answer.store(true, Ordering::SeqCst);
        assert!(cache.is_reachable_at(t0 + Duration::from_secs(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn explicit_probe_bypasses_cache() {
        let (cache, calls, _) = cache(true);
        let t0 = Instant::now();
        assert!(cache.is_reachable_at(t0));
        assert!(cache.probe());
        assert!(cache.is_reachable_at(t0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn http_probe_without_endpoints_is_unreachable() {
        let probe = HttpProbe::new(Vec::new(), Duration::from_millis(10));
        assert!(!probe.probe());
    }

    #[test]
    fn http_probe_to_closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HttpProbe::new(
            vec![format!("http://127.0.0.1:{port}/")],
            Duration::from_millis(200),
        );
        assert!(!probe.probe());
    }

    #[test]
    fn endpoints_are_tried_in_order_until_one_answers() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let closed = TcpListener::bind("127.0.0.1:0").unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        let answering = TcpListener::bind("127.0.0.1:0").unwrap();
        let answering_port = answering.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = answering.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).unwrap();
            stream
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
        });

        let untouched = TcpListener::bind("127.0.0.1:0").unwrap();
        untouched.set_nonblocking(true).unwrap();
        let untouched_port = untouched.local_addr().unwrap().port();

        let checker = HttpProbe::new(
            vec![
                format!("http://127.0.0.1:{closed_port}/"),
                format!("http://127.0.0.1:{answering_port}/"),
                format!("http://127.0.0.1:{untouched_port}/"),
            ],
            Duration::from_secs(2),
        );
        assert!(checker.probe());
        server.join().unwrap();

        let err = untouched.accept().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }
}

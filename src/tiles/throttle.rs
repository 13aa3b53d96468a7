//! Backpressure for tile requests.
//!
//! A [`RequestThrottle`] counts requests in flight against one tile server. Callers
//! ask for a permit with [`RequestThrottle::try_acquire`]; when the cap is reached
//! they get `None` straight away and decide for themselves when to try again.
//! Nothing is queued and no timers are involved. The counter is a single atomic,
//! so the request path never takes a lock.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Throttles shared by every provider in the process, keyed by server authority
static SERVER_THROTTLES: Lazy<Mutex<HashMap<String, Arc<RequestThrottle>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug)]
pub struct RequestThrottle {
    in_flight: AtomicUsize,
    max_in_flight: usize,
}

impl RequestThrottle {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight,
        }
    }

    /// The process-wide throttle for `server`, created with `max_in_flight` on first use.
    /// Later callers share the existing throttle and its original cap.
    pub fn for_server(server: &str, max_in_flight: usize) -> Arc<RequestThrottle> {
        let mut throttles = SERVER_THROTTLES
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let throttle = throttles
            .entry(server.to_string())
            .or_insert_with(|| {
                log::debug!(
                    "creating request throttle for '{}' ({} in flight)",
                    server,
                    max_in_flight
                );
                Arc::new(RequestThrottle::new(max_in_flight))
            });
        if throttle.max_in_flight != max_in_flight {
            log::warn!(
                "request throttle for '{}' already allows {} in flight; ignoring requested {}",
                server,
                throttle.max_in_flight,
                max_in_flight
            );
        }
        Arc::clone(throttle)
    }

    /// Takes a request slot if one is free. The slot is returned when the permit drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ThrottlePermit> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max_in_flight).then_some(current + 1)
            })
            .ok()
            .map(|_| ThrottlePermit {
                throttle: Arc::clone(self),
            })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn available(&self) -> usize {
        self.max_in_flight.saturating_sub(self.in_flight())
    }
}

/// One request slot. Dropping it frees the slot, including when the request
/// future is dropped before completion.
#[derive(Debug)]
pub struct ThrottlePermit {
    throttle: Arc<RequestThrottle>,
}

impl Drop for ThrottlePermit {
    fn drop(&mut self) {
        self.throttle.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Server authority of a URL or URL template, used as the throttle key.
/// `https://a.tile.example.org/1/2/3.png` and `//a.tile.example.org/` both give
/// `a.tile.example.org`; relative URLs give an empty key.
pub fn server_key(url: &str) -> &str {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => match url.strip_prefix("//") {
            Some(rest) => rest,
            None => return "",
        },
    };

    let end = without_scheme
        .find(|c| c == '/' || c == '?' || c == '#')
        .unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_acquire_respects_cap() {
        let throttle = Arc::new(RequestThrottle::new(2));

        let first = throttle.try_acquire();
        let second = throttle.try_acquire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(throttle.try_acquire().is_none());
        assert_eq!(throttle.in_flight(), 2);
        assert_eq!(throttle.available(), 0);

        drop(first);
        assert_eq!(throttle.in_flight(), 1);
        assert!(throttle.try_acquire().is_some());
        assert_eq!(throttle.in_flight(), 1);
    }

    #[test]
    fn test_zero_cap_never_grants() {
        let throttle = Arc::new(RequestThrottle::new(0));
        assert!(throttle.try_acquire().is_none());
        assert_eq!(throttle.in_flight(), 0);
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_cap() {
        let throttle = Arc::new(RequestThrottle::new(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(_permit) = throttle.try_acquire() {
                            assert!(throttle.in_flight() <= 3);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(throttle.in_flight(), 0);
    }

    #[test]
    fn test_server_registry_shares_throttles() {
        let a = RequestThrottle::for_server("registry-test.example.org", 2);
        let b = RequestThrottle::for_server("registry-test.example.org", 9);
        let other = RequestThrottle::for_server("registry-other.example.org", 2);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.max_in_flight(), 2);
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn test_registry_keeps_first_cap_on_conflict() {
        let _ = env_logger::builder().is_test(true).try_init();

        let first = RequestThrottle::for_server("registry-conflict.example.org", 4);
        let again = RequestThrottle::for_server("registry-conflict.example.org", 4);
        let conflicting = RequestThrottle::for_server("registry-conflict.example.org", 1);

        assert!(Arc::ptr_eq(&first, &again));
        assert!(Arc::ptr_eq(&first, &conflicting));
        assert_eq!(conflicting.max_in_flight(), 4);
        assert_eq!(conflicting.available(), 4);
    }

    #[test]
    fn test_server_key() {
        assert_eq!(server_key("//a.tile.openstreetmap.org/"), "a.tile.openstreetmap.org");
        assert_eq!(
            server_key("https://tiles.example.com:8080/{z}/{x}/{y}.png"),
            "tiles.example.com:8080"
        );
        assert_eq!(server_key("http://example.com?x=1"), "example.com");
        assert_eq!(server_key("/local/tiles/"), "");
    }
}

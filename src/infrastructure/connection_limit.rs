//! Admission control for gateway WebSocket sessions
//!
//! Slots are acquired before the upgrade and released when the returned
//! `ConnectionSlot` is dropped, so a session that ends for any reason frees
//! its slot.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Global and per-IP session limits
#[derive(Debug)]
pub struct ConnectionLimiter {
    max_total: usize,
    max_per_ip: usize,
    counts: Mutex<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    total: usize,
    per_ip: HashMap<IpAddr, usize>,
}

/// One admitted session; releases its slot on drop
#[derive(Debug)]
pub struct ConnectionSlot {
    limiter: Arc<ConnectionLimiter>,
    ip: IpAddr,
}

impl ConnectionLimiter {
    pub fn new(max_total: usize, max_per_ip: usize) -> Self {
        Self {
            max_total,
            max_per_ip,
            counts: Mutex::new(Counts::default()),
        }
    }

    /// Take a slot for `ip`, or `None` when either limit is reached
    pub fn acquire(self: &Arc<Self>, ip: IpAddr) -> Option<ConnectionSlot> {
        let mut counts = self.counts.lock();
        let from_ip = counts.per_ip.get(&ip).copied().unwrap_or(0);
        if counts.total >= self.max_total || from_ip >= self.max_per_ip {
            return None;
        }

        counts.total += 1;
        counts.per_ip.insert(ip, from_ip + 1);
        Some(ConnectionSlot {
            limiter: Arc::clone(self),
            ip,
        })
    }

    fn release(&self, ip: IpAddr) {
        let mut counts = self.counts.lock();
        counts.total = counts.total.saturating_sub(1);
        if let Some(n) = counts.per_ip.get_mut(&ip) {
            *n -= 1;
            if *n == 0 {
                counts.per_ip.remove(&ip);
            }
        }
    }

    /// Sessions currently admitted
    pub fn active(&self) -> usize {
        self.counts.lock().total
    }
}

impl ConnectionSlot {
    #[inline]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.limiter.release(self.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn test_per_ip_limit() {
        let limiter = Arc::new(ConnectionLimiter::new(10, 2));
        let a = limiter.acquire(ip(1)).unwrap();
        let _b = limiter.acquire(ip(1)).unwrap();
        assert!(limiter.acquire(ip(1)).is_none());
        assert!(limiter.acquire(ip(2)).is_some());

        drop(a);
        assert_eq!(limiter.active(), 1);
        assert!(limiter.acquire(ip(1)).is_some());
    }

    #[test]
    fn test_global_limit() {
        let limiter = Arc::new(ConnectionLimiter::new(2, 5));
        let _a = limiter.acquire(ip(1)).unwrap();
        let b = limiter.acquire(ip(2)).unwrap();
        assert!(limiter.acquire(ip(3)).is_none());

        assert_eq!(b.ip(), ip(2));
        drop(b);
        assert_eq!(limiter.active(), 1);
        assert!(limiter.acquire(ip(3)).is_some());
    }

    #[test]
    fn test_release_forgets_idle_ips() {
        let limiter = Arc::new(ConnectionLimiter::new(5, 5));
        drop(limiter.acquire(ip(7)).unwrap());
        assert_eq!(limiter.active(), 0);
        assert!(limiter.counts.lock().per_ip.is_empty());
    }
}

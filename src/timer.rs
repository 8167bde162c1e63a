//! Retransmission timer and retry policy.
//!
//! The sender keeps at most one packet in flight and protects it with a
//! single [`RetransmitTimer`].  The timer is plain data: an optional
//! deadline computed from a fixed timeout.  Callers pass the current
//! [`Instant`] in, which keeps the sender state machine testable on a fake
//! clock and leaves the actual waiting to the async driver
//! (`tokio::time::timeout_at`).
//!
//! There is no RTT estimation and no back-off: every (re)transmission waits
//! for the same configured timeout.

use std::time::Duration;

use tokio::time::Instant;

/// How many times a single packet may be retransmitted.
///
/// The default is unbounded, which is only safe on a link that eventually
/// delivers (drop probability below 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Maximum retransmissions per packet; `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self { max_retries: None }
    }

    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
        }
    }

    /// `true` if a packet already retransmitted `retries` times may go again.
    pub fn allows(&self, retries: u32) -> bool {
        self.max_retries.is_none_or(|max| retries < max)
    }
}

/// Returned by [`RetransmitTimer::expire`] once the policy gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetriesExhausted {
    pub retries: u32,
}

/// A fixed-timeout retransmission timer for one in-flight packet.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    policy: RetryPolicy,
    deadline: Option<Instant>,
    /// Retransmissions of the current packet so far.
    retries: u32,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Self {
        Self {
            timeout,
            policy,
            deadline: None,
            retries: 0,
        }
    }

    /// Arm the timer for a freshly sent packet.  Resets the retry count.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
        self.retries = 0;
    }

    /// Disarm the timer (matching reply received).
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.retries = 0;
    }

    /// Current deadline, or `None` when disarmed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` if armed and `now` is at or past the deadline.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Record an expiry: count one more retransmission and re-arm from `now`.
    ///
    /// Fails without re-arming once the retry policy is exhausted.
    pub fn expire(&mut self, now: Instant) -> Result<(), RetriesExhausted> {
        if !self.policy.allows(self.retries) {
            self.deadline = None;
            return Err(RetriesExhausted {
                retries: self.retries,
            });
        }
        self.retries = self.retries.saturating_add(1);
        self.deadline = Some(now + self.timeout);
        Ok(())
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RTO: Duration = Duration::from_millis(100);

    #[test]
    fn new_timer_is_disarmed() {
        let t = RetransmitTimer::new(RTO, RetryPolicy::default());
        assert!(!t.is_armed());
        assert!(!t.is_expired(Instant::now()));
    }

    #[test]
    fn expires_exactly_at_deadline() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(RTO, RetryPolicy::default());
        t.arm(now);
        assert!(!t.is_expired(now + RTO - Duration::from_millis(1)));
        assert!(t.is_expired(now + RTO));
    }

    #[test]
    fn expire_rearms_with_same_timeout() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(RTO, RetryPolicy::unbounded());
        t.arm(now);
        let later = now + RTO;
        t.expire(later).unwrap();
        assert_eq!(t.deadline(), Some(later + RTO));
        assert_eq!(t.retries(), 1);
    }

    #[test]
    fn unbounded_policy_never_gives_up() {
        let mut now = Instant::now();
        let mut t = RetransmitTimer::new(RTO, RetryPolicy::unbounded());
        t.arm(now);
        for _ in 0..1_000 {
            now += RTO;
            t.expire(now).unwrap();
        }
        assert_eq!(t.retries(), 1_000);
    }

    #[test]
    fn unbounded_retry_count_saturates() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(RTO, RetryPolicy::unbounded());
        t.arm(now);
        t.retries = u32::MAX;
        t.expire(now).unwrap();
        assert_eq!(t.retries(), u32::MAX);
        assert_eq!(t.deadline(), Some(now + RTO));
    }

    #[test]
    fn bounded_policy_stops_after_limit() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(RTO, RetryPolicy::bounded(2));
        t.arm(now);
        t.expire(now).unwrap();
        t.expire(now).unwrap();
        assert_eq!(t.expire(now), Err(RetriesExhausted { retries: 2 }));
        assert!(!t.is_armed());
    }

    #[test]
    fn cancel_and_rearm_reset_retries() {
        let now = Instant::now();
        let mut t = RetransmitTimer::new(RTO, RetryPolicy::bounded(1));
        t.arm(now);
        t.expire(now).unwrap();
        t.cancel();
        assert!(!t.is_armed());
        t.arm(now);
        assert_eq!(t.retries(), 0);
        t.expire(now).unwrap();
    }
}

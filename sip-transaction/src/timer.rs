//! RFC 3261 §17.1/§17.2 timer values and retransmit interval sequencing.
//!
//! Grouped into a single config struct passed in at construction time
//! rather than process-wide globals, per `SPEC_FULL.md` §1 "Configuration"
//! and `spec.md` §9 "Global clock and randomness".

use std::time::Duration;

/// RFC 3261 §17.1.1.1 defaults. `t4` (max duration a message can remain in
/// the network) isn't named in `spec.md`'s T1/T2/T6 triad but the INVITE
/// server Confirmed wait (Timer I) and non-INVITE client Completed wait
/// (Timer K) are both defined in terms of it, so it's carried alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// RTT estimate; base retransmit interval. Default 500ms.
    pub t1: Duration,
    /// Maximum retransmit interval for non-INVITE requests/responses.
    /// Default 4s.
    pub t2: Duration,
    /// Default 64 * T1 = 32s; INVITE transaction timeout ceiling.
    pub t6: Duration,
    /// Default 5s; max duration a message can remain in the network.
    pub t4: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        let t1 = Duration::from_millis(500);
        Self { t1, t2: Duration::from_secs(4), t6: t1 * 64, t4: Duration::from_secs(5) }
    }
}

impl TimerSettings {
    /// Timer A: INVITE client retransmit interval (reused each retransmit,
    /// doubling, per [`retransmit_intervals`]).
    pub fn timer_a(&self) -> Duration {
        self.t1
    }

    /// Timer B: INVITE client Calling-state timeout.
    pub fn timer_b(&self) -> Duration {
        self.t6
    }

    /// Timer D: INVITE client Completed-state wait for response
    /// retransmits on an unreliable transport. RFC 3261: at least 32s.
    pub fn timer_d(&self) -> Duration {
        self.t6.max(Duration::from_secs(32))
    }

    /// Timer E: non-INVITE client retransmit interval.
    pub fn timer_e(&self) -> Duration {
        self.t1
    }

    /// Timer F: non-INVITE client transaction timeout.
    pub fn timer_f(&self) -> Duration {
        self.t6
    }

    /// Timer G: INVITE server retransmit interval for the final response.
    pub fn timer_g(&self) -> Duration {
        self.t1
    }

    /// Timer H: INVITE server Completed-state timeout (wait for ACK).
    pub fn timer_h(&self) -> Duration {
        self.t6
    }

    /// Timer I: INVITE server Confirmed-state wait, to absorb ACK
    /// retransmits, before Terminated.
    pub fn timer_i(&self) -> Duration {
        self.t4
    }

    /// Timer J: non-INVITE server Completed-state wait, to absorb duplicate
    /// requests, before Terminated.
    pub fn timer_j(&self) -> Duration {
        self.t6
    }

    /// Timer K: non-INVITE client Completed-state wait before Terminated.
    pub fn timer_k(&self) -> Duration {
        self.t4
    }
}

/// Yields the doubling retransmit interval sequence T1, 2·T1, 4·T1, …
/// capped at `t2`, continuing indefinitely at `t2` thereafter. Callers stop
/// consuming once cumulative elapsed time reaches the relevant timeout
/// (Timer B/F/H). `spec.md` §8 scenario 3 worked example: cumulative fire
/// times T1, 3·T1, 7·T1, 15·T1, … before the cap is reached.
pub fn retransmit_intervals(t1: Duration, t2: Duration) -> impl Iterator<Item = Duration> {
    let mut next = t1;
    std::iter::from_fn(move || {
        let current = next;
        next = (next * 2).min(t2);
        Some(current)
    })
}

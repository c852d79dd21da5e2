//! RFC 3262 reliable provisional responses: RSeq assignment and RAck
//! matching (`spec.md` §4.5 "Reliable provisional").
//!
//! A reliable 1xx is retransmitted on the same doubling/capped schedule as
//! an INVITE final response (Timer G) until its PRACK arrives, so this
//! reuses [`crate::timer::retransmit_intervals`] rather than inventing a
//! separate RT1/RT2 sequence.

use tokio::time::Instant;

use sip_core::prelude::{Method, Response};

use crate::error::{Error, Result};

/// Tracks the single outstanding reliable provisional response for one
/// INVITE server transaction. RFC 3262 permits only one unacknowledged
/// reliable 1xx in flight at a time per transaction.
#[derive(Debug, Clone)]
pub struct PrackTracker {
    next_rseq: u32,
    pending: Option<Pending>,
}

impl Default for PrackTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Pending {
    rseq: u32,
    response: Response,
    retransmit_count: u32,
    armed_at: Instant,
}

impl PrackTracker {
    pub fn new() -> Self {
        Self { next_rseq: 1, pending: None }
    }

    /// True while a reliable 1xx is awaiting its PRACK; callers must not
    /// send a second reliable 1xx until this clears.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Assigns the next RSeq to `response` and arms retransmission.
    /// Returns an error if a reliable provisional is already outstanding.
    pub fn arm(&mut self, mut response: Response) -> Result<Response> {
        if self.pending.is_some() {
            return Err(Error::InvalidTransition {
                key: "prack".to_string(),
                from: "armed".to_string(),
                attempted: "arm".to_string(),
            });
        }
        let rseq = self.next_rseq;
        self.next_rseq += 1;
        response.headers.rseq = Some(rseq);
        self.pending = Some(Pending { rseq, response: response.clone(), retransmit_count: 0, armed_at: Instant::now() });
        Ok(response)
    }

    /// Returns the response to retransmit, bumping the attempt counter, or
    /// `None` if nothing is armed.
    pub fn retransmit(&mut self) -> Option<(Response, u32)> {
        let pending = self.pending.as_mut()?;
        pending.retransmit_count += 1;
        Some((pending.response.clone(), pending.retransmit_count))
    }

    /// Whether enough time has passed since arming (or the last
    /// retransmit) to fire the next attempt in the T1-doubling/T2-capped
    /// schedule `spec.md` §4.5 specifies for a reliable provisional.
    pub fn is_due(&self, t1: std::time::Duration, t2: std::time::Duration) -> bool {
        let Some(pending) = &self.pending else { return false };
        let due_at = crate::timer::retransmit_intervals(t1, t2)
            .take(pending.retransmit_count as usize + 1)
            .fold(std::time::Duration::ZERO, |acc, d| acc + d);
        pending.armed_at.elapsed() >= due_at
    }

    /// Checks an inbound RAck against the outstanding reliable provisional.
    /// On a match, disarms and returns `true`; a non-matching RAck (stale
    /// retransmit of an earlier PRACK, or a mismatched CSeq method) is
    /// reported as `false` without disarming.
    pub fn acknowledge(&mut self, rack_rseq: u32, rack_cseq: u32, rack_method: &Method, request_cseq: u32) -> bool {
        let Some(pending) = &self.pending else { return false };
        let matches = pending.rseq == rack_rseq && rack_cseq == request_cseq && *rack_method == Method::Invite;
        if matches {
            self.pending = None;
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_core::prelude::*;

    fn provisional() -> Response {
        Response::new(StatusCode(183))
    }

    #[test]
    fn arming_assigns_incrementing_rseq() {
        let mut tracker = PrackTracker::new();
        let armed = tracker.arm(provisional()).unwrap();
        assert_eq!(armed.headers.rseq, Some(1));
        assert!(tracker.is_armed());
    }

    #[test]
    fn cannot_arm_a_second_reliable_provisional_while_one_is_pending() {
        let mut tracker = PrackTracker::new();
        tracker.arm(provisional()).unwrap();
        assert!(tracker.arm(provisional()).is_err());
    }

    #[test]
    fn matching_rack_disarms() {
        let mut tracker = PrackTracker::new();
        tracker.arm(provisional()).unwrap();
        assert!(tracker.acknowledge(1, 314159, &Method::Invite, 314159));
        assert!(!tracker.is_armed());
    }

    #[test]
    fn mismatched_rack_does_not_disarm() {
        let mut tracker = PrackTracker::new();
        tracker.arm(provisional()).unwrap();
        assert!(!tracker.acknowledge(99, 314159, &Method::Invite, 314159));
        assert!(tracker.is_armed());
    }

    #[test]
    fn not_due_immediately_after_arming() {
        let mut tracker = PrackTracker::new();
        tracker.arm(provisional()).unwrap();
        assert!(!tracker.is_due(std::time::Duration::from_secs(5), std::time::Duration::from_secs(20)));
    }

    #[test]
    fn nothing_armed_is_never_due() {
        let tracker = PrackTracker::new();
        assert!(!tracker.is_due(std::time::Duration::from_millis(1), std::time::Duration::from_secs(1)));
    }

    #[test]
    fn retransmit_bumps_attempt_counter() {
        let mut tracker = PrackTracker::new();
        tracker.arm(provisional()).unwrap();
        let (_, attempt1) = tracker.retransmit().unwrap();
        let (_, attempt2) = tracker.retransmit().unwrap();
        assert_eq!(attempt1, 1);
        assert_eq!(attempt2, 2);
    }
}

//! Adaptive ACK/NACK backoff for a `TunnelOutEndpoint`.
//!
//! Unlike a reconnect backoff (which only ever grows until a connection
//! succeeds), this backoff resets to zero on every ACK and only grows on
//! NACKs — it tracks flow-control pressure from the receiving queue, not
//! link availability. The exact formula is called out in the spec's design
//! notes as load-bearing and must not be altered:
//! `backoff = min(1.0, backoff < 0.1 ? 0.1 : backoff * 2.0)`.

/// Tracks one `TunnelOutEndpoint`'s send-pacing state.
///
/// # Examples
///
/// ```
/// use dataflow_core::backoff::TunnelBackoff;
///
/// let mut b = TunnelBackoff::new();
/// assert_eq!(b.seconds(), 0.0);
/// assert_eq!(b.on_nack(), 0.1);
/// assert_eq!(b.on_nack(), 0.2);
/// assert_eq!(b.on_nack(), 0.4);
/// b.on_ack();
/// assert_eq!(b.seconds(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunnelBackoff {
    seconds: f64,
}

impl TunnelBackoff {
    const FLOOR: f64 = 0.1;
    const CEILING: f64 = 1.0;

    #[must_use]
    pub const fn new() -> Self {
        Self { seconds: 0.0 }
    }

    /// Current backoff interval in seconds.
    #[must_use]
    pub const fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Reset to full speed after a successful ACK.
    pub fn on_ack(&mut self) {
        self.seconds = 0.0;
    }

    /// Grow the backoff after a NACK and return the new interval: first
    /// NACK jumps straight to the floor, every subsequent one doubles,
    /// capped at the ceiling.
    pub fn on_nack(&mut self) -> f64 {
        self.seconds = (Self::CEILING).min(if self.seconds < Self::FLOOR {
            Self::FLOOR
        } else {
            self.seconds * 2.0
        });
        self.seconds
    }
}

impl Default for TunnelBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(TunnelBackoff::new().seconds(), 0.0);
    }

    #[test]
    fn first_nack_jumps_to_floor() {
        let mut b = TunnelBackoff::new();
        assert_eq!(b.on_nack(), 0.1);
    }

    #[test]
    fn subsequent_nacks_double_and_cap() {
        let mut b = TunnelBackoff::new();
        let expected = [0.1, 0.2, 0.4, 0.8, 1.0, 1.0];
        for e in expected {
            assert!((b.on_nack() - e).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ack_resets_to_zero() {
        let mut b = TunnelBackoff::new();
        b.on_nack();
        b.on_nack();
        b.on_ack();
        assert_eq!(b.seconds(), 0.0);
        // after reset, backoff grows from the floor again, not from
        // where it left off.
        assert_eq!(b.on_nack(), 0.1);
    }

    proptest::proptest! {
        #[test]
        fn backoff_after_k_nacks_matches_closed_form(k in 1u32..20) {
            let mut b = TunnelBackoff::new();
            let mut last = 0.0;
            for _ in 0..k {
                last = b.on_nack();
            }
            let expected = (0.1 * 2f64.powi(k as i32 - 1)).min(1.0);
            prop_assert!((last - expected).abs() < 1e-9);
        }
    }
}

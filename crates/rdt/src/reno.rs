//! TCP Reno-style congestion control as a pure state machine.
//!
//! The original sender keeps `cwnd`/`ssthresh`/`dupAckCount` as loose globals
//! mutated inline in the main loop. Here the same transition table is pulled
//! out into a tagged enum plus a pure `transition` function so it can be
//! tested without any socket or timer involved.

/// Which congestion-control regime the sender is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionState {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// Events that drive a transition. `TripleDupAck` is raised once, the moment
/// the third duplicate ACK for the same sequence number is observed; repeat
/// duplicates after that are `DupAck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    NewDataAck,
    DupAck,
    TripleDupAck,
    Timeout,
}

/// Congestion window (real-valued, so slow-start growth and CA's `1/cwnd`
/// increments accumulate fractionally) plus integer slow-start threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionController {
    pub state: CongestionState,
    pub cwnd: f64,
    pub ssthresh: u32,
    pub dup_ack_count: u32,
}

impl CongestionController {
    pub fn new() -> Self {
        CongestionController {
            state: CongestionState::SlowStart,
            cwnd: 1.0,
            ssthresh: 16,
            dup_ack_count: 0,
        }
    }

    /// The current send window in whole packets.
    pub fn window(&self) -> u32 {
        self.cwnd as u32
    }

    pub fn on_event(&mut self, event: Event) {
        *self = transition(*self, event);
    }
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure transition function implementing the Reno table:
///
/// | state               | event         | next state           |
/// |----------------------|--------------|-----------------------|
/// | SlowStart            | NewDataAck   | cwnd += 1; switch to CongestionAvoidance once cwnd >= ssthresh |
/// | CongestionAvoidance  | NewDataAck   | cwnd += 1/cwnd |
/// | SlowStart/CA         | DupAck       | dup_ack_count += 1 |
/// | any                  | TripleDupAck | ssthresh = max(2, cwnd/2); cwnd = ssthresh + 3; -> FastRecovery |
/// | FastRecovery         | DupAck       | cwnd += 1 |
/// | FastRecovery         | NewDataAck   | cwnd = ssthresh; -> CongestionAvoidance |
/// | any                  | Timeout      | ssthresh = max(2, cwnd/2); cwnd = 1; -> SlowStart |
pub fn transition(mut c: CongestionController, event: Event) -> CongestionController {
    match event {
        Event::Timeout => {
            c.ssthresh = ((c.cwnd as u32) / 2).max(2);
            c.cwnd = 1.0;
            c.dup_ack_count = 0;
            c.state = CongestionState::SlowStart;
        }
        Event::TripleDupAck => {
            c.ssthresh = ((c.cwnd as u32) / 2).max(2);
            c.cwnd = c.ssthresh as f64 + 3.0;
            c.dup_ack_count = 0;
            c.state = CongestionState::FastRecovery;
        }
        Event::DupAck => match c.state {
            CongestionState::FastRecovery => {
                c.cwnd += 1.0;
            }
            CongestionState::SlowStart | CongestionState::CongestionAvoidance => {
                c.dup_ack_count += 1;
            }
        },
        Event::NewDataAck => {
            c.dup_ack_count = 0;
            match c.state {
                CongestionState::SlowStart => {
                    c.cwnd += 1.0;
                    if c.cwnd >= c.ssthresh as f64 {
                        c.state = CongestionState::CongestionAvoidance;
                    }
                }
                CongestionState::CongestionAvoidance => {
                    c.cwnd += 1.0 / c.cwnd;
                }
                CongestionState::FastRecovery => {
                    c.cwnd = c.ssthresh as f64;
                    c.state = CongestionState::CongestionAvoidance;
                }
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_start_doubles_roughly_every_rtt() {
        let mut c = CongestionController::new();
        c.on_event(Event::NewDataAck);
        c.on_event(Event::NewDataAck);
        assert_eq!(c.state, CongestionState::SlowStart);
        assert_eq!(c.window(), 3);
    }

    #[test]
    fn slow_start_switches_to_congestion_avoidance_at_ssthresh() {
        let mut c = CongestionController::new();
        c.ssthresh = 4;
        for _ in 0..4 {
            c.on_event(Event::NewDataAck);
        }
        assert_eq!(c.state, CongestionState::CongestionAvoidance);
        assert_eq!(c.window(), 4);
    }

    #[test]
    fn congestion_avoidance_grows_linearly() {
        let mut c = CongestionController {
            state: CongestionState::CongestionAvoidance,
            cwnd: 4.0,
            ssthresh: 4,
            dup_ack_count: 0,
        };
        c.on_event(Event::NewDataAck);
        assert_eq!(c.state, CongestionState::CongestionAvoidance);
        assert!((c.cwnd - 4.25).abs() < 1e-9);
    }

    #[test]
    fn triple_dup_ack_halves_ssthresh_and_enters_fast_recovery() {
        let mut c = CongestionController {
            state: CongestionState::CongestionAvoidance,
            cwnd: 10.0,
            ssthresh: 10,
            dup_ack_count: 2,
        };
        c.on_event(Event::TripleDupAck);
        assert_eq!(c.state, CongestionState::FastRecovery);
        assert_eq!(c.ssthresh, 5);
        assert_eq!(c.window(), 8);
    }

    #[test]
    fn fast_recovery_inflates_on_further_dup_acks() {
        let mut c = CongestionController {
            state: CongestionState::FastRecovery,
            cwnd: 8.0,
            ssthresh: 5,
            dup_ack_count: 0,
        };
        c.on_event(Event::DupAck);
        c.on_event(Event::DupAck);
        assert_eq!(c.state, CongestionState::FastRecovery);
        assert_eq!(c.window(), 10);
    }

    #[test]
    fn fast_recovery_deflates_to_ssthresh_on_new_data_ack() {
        let mut c = CongestionController {
            state: CongestionState::FastRecovery,
            cwnd: 9.0,
            ssthresh: 5,
            dup_ack_count: 0,
        };
        c.on_event(Event::NewDataAck);
        assert_eq!(c.state, CongestionState::CongestionAvoidance);
        assert_eq!(c.window(), 5);
    }

    #[test]
    fn timeout_resets_to_slow_start_from_any_state() {
        for initial in [
            CongestionState::SlowStart,
            CongestionState::CongestionAvoidance,
            CongestionState::FastRecovery,
        ] {
            let mut c = CongestionController {
                state: initial,
                cwnd: 20.0,
                ssthresh: 16,
                dup_ack_count: 1,
            };
            c.on_event(Event::Timeout);
            assert_eq!(c.state, CongestionState::SlowStart);
            assert_eq!(c.ssthresh, 10);
            assert_eq!(c.window(), 1);
            assert_eq!(c.dup_ack_count, 0);
        }
    }

    #[test]
    fn timeout_ssthresh_never_drops_below_two() {
        let mut c = CongestionController {
            state: CongestionState::SlowStart,
            cwnd: 2.0,
            ssthresh: 16,
            dup_ack_count: 0,
        };
        c.on_event(Event::Timeout);
        assert_eq!(c.ssthresh, 2);
    }
}

// Fire rate limiter: Idle -> Firing -> Idle.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireState {
    Idle,
    Firing { cooldown_deadline: Duration },
}

/// Per-character rate limiter living on the node that controls the character.
///
/// Time is the node's simulation clock. The cooldown always runs to completion, whatever
/// happens to the fire invocation it guarded.
#[derive(Debug, Clone)]
pub struct FireController {
    fire_rate: Duration,
    state: FireState,
}

impl FireController {
    pub fn new(fire_rate: Duration) -> Self {
        Self {
            fire_rate,
            state: FireState::Idle,
        }
    }

    pub fn state(&self) -> FireState {
        self.state
    }

    pub fn is_firing(&self) -> bool {
        matches!(self.state, FireState::Firing { .. })
    }

    /// Attempts to start a shot at `now`.
    ///
    /// Returns true when the caller should issue exactly one `handle_fire` invocation.
    pub fn start_fire(&mut self, now: Duration) -> bool {
        self.expire(now);
        if self.is_firing() {
            return false;
        }
        self.state = FireState::Firing {
            cooldown_deadline: now + self.fire_rate,
        };
        true
    }

    /// Timer callback: returns to `Idle` once the deadline has passed.
    ///
    /// Returns true if this call performed the transition.
    pub fn expire(&mut self, now: Duration) -> bool {
        match self.state {
            FireState::Firing { cooldown_deadline } if now >= cooldown_deadline => {
                self.state = FireState::Idle;
                true
            }
            _ => false,
        }
    }
}

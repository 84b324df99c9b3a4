// One-shot death transition.

/// Latches the destroyed state of a character.
///
/// The flag flips in the same call that detects zero health, so a second evaluation never
/// fires again. `reset` must be called together with a health reset.
#[derive(Debug, Clone, Default)]
pub struct DeathLatch {
    destroyed: bool,
}

impl DeathLatch {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Returns true exactly once: the first time it sees zero health.
    pub fn evaluate(&mut self, current_health: f32) -> bool {
        if self.destroyed || current_health != 0.0 {
            return false;
        }
        self.destroyed = true;
        true
    }

    pub fn reset(&mut self) {
        self.destroyed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_health_is_positive_then_no_transition() {
        let mut latch = DeathLatch::default();
        assert!(!latch.evaluate(0.5));
        assert!(!latch.is_destroyed());
    }

    #[test]
    fn when_health_hits_zero_repeatedly_then_transition_fires_once() {
        let mut latch = DeathLatch::default();
        assert!(latch.evaluate(0.0));
        assert!(!latch.evaluate(0.0));
        assert!(!latch.evaluate(0.0));
        assert!(latch.is_destroyed());
    }

    #[test]
    fn when_reset_then_latch_can_fire_again() {
        let mut latch = DeathLatch::default();
        assert!(latch.evaluate(0.0));
        latch.reset();
        assert!(!latch.evaluate(100.0));
        assert!(latch.evaluate(0.0));
    }
}

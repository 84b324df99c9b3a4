// Replicated health: canonical on the authority, cached on observers.

use crate::domain::authority::Role;

/// Health field of one character instance on one node.
///
/// `max` is static configuration loaded identically on every node and is never replicated.
#[derive(Debug, Clone)]
pub struct ReplicatedHealth {
    role: Role,
    current: f32,
    max: f32,
}

impl ReplicatedHealth {
    pub fn new(role: Role, max: f32) -> Self {
        let max = max.max(0.0);
        Self {
            role,
            current: max,
            max,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Authority-side write. Returns the stored (clamped) value, or `None` when the local
    /// instance is an observer and the write was rejected.
    pub fn set(&mut self, value: f32) -> Option<f32> {
        if self.role != Role::Authority {
            return None;
        }
        self.current = clamp_health(value, self.max);
        Some(self.current)
    }

    /// Observer-side write of a value received from the authority.
    ///
    /// The cache always takes the delivered value (clamped against the local config).
    pub fn apply_replicated(&mut self, value: f32) -> f32 {
        self.current = clamp_health(value, self.max);
        self.current
    }

    /// Restores full health. Callers reset the death latch in the same step.
    pub fn reset(&mut self) {
        self.current = self.max;
    }
}

fn clamp_health(value: f32, max: f32) -> f32 {
    // NaN saturates to zero rather than poisoning the invariant.
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_created_then_health_starts_at_max() {
        let health = ReplicatedHealth::new(Role::Authority, 100.0);
        assert_eq!(health.current(), 100.0);
        assert_eq!(health.max(), 100.0);
    }

    #[test]
    fn when_authority_sets_out_of_range_values_then_they_saturate() {
        let mut health = ReplicatedHealth::new(Role::Authority, 100.0);
        for (input, expected) in [
            (-20.0, 0.0),
            (250.0, 100.0),
            (42.5, 42.5),
            (f32::NEG_INFINITY, 0.0),
            (f32::NAN, 0.0),
        ] {
            assert_eq!(health.set(input), Some(expected));
            assert!((0.0..=100.0).contains(&health.current()));
        }
    }

    #[test]
    fn when_observer_sets_health_then_write_is_rejected() {
        let mut health = ReplicatedHealth::new(Role::Observer, 100.0);
        assert_eq!(health.set(10.0), None);
        assert_eq!(health.current(), 100.0);
    }

    #[test]
    fn when_observer_receives_update_then_cache_is_overwritten() {
        let mut health = ReplicatedHealth::new(Role::Observer, 100.0);
        assert_eq!(health.apply_replicated(70.0), 70.0);
        assert_eq!(health.apply_replicated(70.0), 70.0);
        assert_eq!(health.current(), 70.0);
    }
}

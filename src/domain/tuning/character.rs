use std::time::Duration;

/// Gameplay tuning for player characters.
///
/// Every node loads the same values; none of these are replicated.
#[derive(Debug, Clone, Copy)]
pub struct CharacterTuning {
    /// Health at spawn and upper clamp bound.
    pub max_health: f32,

    /// Minimum time between two shots.
    pub fire_rate: Duration,

    /// Muzzle distance in front of the character, along the aim direction.
    pub muzzle_forward: f32,

    /// Muzzle height above the character origin.
    pub muzzle_up: f32,

    /// Delay before the authority respawns a destroyed character.
    pub respawn_delay: Duration,
}

impl Default for CharacterTuning {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            fire_rate: Duration::from_millis(250),
            muzzle_forward: 100.0,
            muzzle_up: 50.0,
            respawn_delay: Duration::from_secs(5),
        }
    }
}

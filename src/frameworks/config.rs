use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("AUTHORITY_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn tick_interval() -> Duration {
    let hz = env::var("TICK_RATE_HZ")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|hz| (1..=1000).contains(hz))
        .unwrap_or(60);
    Duration::from_secs(1) / hz
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const REPLICATION_BROADCAST_CAPACITY: usize = 128;

use std::time::Duration;

pub const DEFAULT_TICK_MILLIS: u64 = 1000;
pub const DEFAULT_AUTO_ADVANCE_DELAY_MS: u64 = 1000;
pub const DEFAULT_EVENT_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub tick_period: Duration,
    pub auto_advance_delay: Duration,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(DEFAULT_TICK_MILLIS),
            auto_advance_delay: Duration::from_millis(DEFAULT_AUTO_ADVANCE_DELAY_MS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse::<T>().ok())
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let tick_millis = env_parse::<u64>("QUIZ_TICK_MILLIS")
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TICK_MILLIS);
        let auto_advance_ms =
            env_parse::<u64>("QUIZ_AUTO_ADVANCE_DELAY_MS").unwrap_or(DEFAULT_AUTO_ADVANCE_DELAY_MS);
        let event_capacity = env_parse::<usize>("QUIZ_EVENT_CAPACITY")
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_EVENT_CAPACITY);
        Self {
            tick_period: Duration::from_millis(tick_millis),
            auto_advance_delay: Duration::from_millis(auto_advance_ms),
            event_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_and_fallbacks() {
        std::env::set_var("QUIZ_TICK_MILLIS", "250");
        std::env::set_var("QUIZ_AUTO_ADVANCE_DELAY_MS", "not-a-number");
        std::env::set_var("QUIZ_EVENT_CAPACITY", "0");
        let config = EngineConfig::from_env();
        assert_eq!(config.tick_period, Duration::from_millis(250));
        assert_eq!(config.auto_advance_delay, Duration::from_millis(1000));
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        std::env::remove_var("QUIZ_TICK_MILLIS");
        std::env::remove_var("QUIZ_AUTO_ADVANCE_DELAY_MS");
        std::env::remove_var("QUIZ_EVENT_CAPACITY");
    }
}

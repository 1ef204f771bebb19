//! Runtime configuration of the HAL.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Environment variable overriding [`HalConfig::card`].
pub const ENV_CARD: &str = "ARIES_AUDIO_CARD";
/// Environment variable overriding [`HalConfig::call_volume_steps`].
pub const ENV_CALL_VOLUME_STEPS: &str = "ARIES_AUDIO_CALL_VOLUME_STEPS";

/// Settings of one device instance.
///
/// ```
/// use aries_audio_hw::config::HalConfig;
///
/// let config = HalConfig {
///     call_volume_steps: 6,
///     ..Default::default()
/// };
/// assert_eq!(config.card, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalConfig {
    /// Sound card carrying the codec and the modem interface.
    ///
    /// Default: 0
    pub card: u32,

    /// Number of volume levels the modem distinguishes for a call.
    ///
    /// Default: 5
    pub call_volume_steps: u32,

    /// Shortest sleep of the playback pacing loop.
    ///
    /// Default: 5ms
    pub min_write_sleep: Duration,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            card: 0,
            call_volume_steps: 5,
            min_write_sleep: Duration::from_millis(5),
        }
    }
}

impl HalConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Values that do not parse are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(card) = parse_var(&lookup, ENV_CARD) {
            config.card = card;
        }
        if let Some(steps) = parse_var(&lookup, ENV_CALL_VOLUME_STEPS) {
            config.call_volume_steps = steps;
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

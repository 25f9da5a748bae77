//! Voice output settings.
//!
//! Controls how synthesized speech sounds to the caller. The defaults match
//! the tuning the helpline shipped with: slightly slowed, slightly raised
//! pitch, full volume, preferring a female voice when one is installed.

use serde::{Deserialize, Serialize};

/// Settings applied to every synthesized utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Speech rate multiplier (1.0 is normal).
    #[serde(default = "default_rate")]
    pub rate: f32,
    /// Pitch multiplier (1.0 is normal).
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    /// Output volume in 0.0..=1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Substring matched against installed voice names; first match wins.
    #[serde(default)]
    pub preferred_voice: Option<String>,
}

fn default_rate() -> f32 {
    0.9
}

fn default_pitch() -> f32 {
    1.1
}

fn default_volume() -> f32 {
    1.0
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
            preferred_voice: Some("Female".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_tuning() {
        let settings = VoiceSettings::default();
        assert_eq!(settings.rate, 0.9);
        assert_eq!(settings.pitch, 1.1);
        assert_eq!(settings.volume, 1.0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: VoiceSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.rate, 0.9);
        assert!(settings.preferred_voice.is_none());
    }
}

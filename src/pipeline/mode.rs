use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;

/// Analysis pipeline variant, selected once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    PitchDetection,
    #[default]
    PlayerDetection,
    BallDetection,
    PlayerTracking,
    TeamClassification,
    Radar,
    SaveDetection,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::PitchDetection,
        Mode::PlayerDetection,
        Mode::BallDetection,
        Mode::PlayerTracking,
        Mode::TeamClassification,
        Mode::Radar,
        Mode::SaveDetection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::PitchDetection => "PITCH_DETECTION",
            Mode::PlayerDetection => "PLAYER_DETECTION",
            Mode::BallDetection => "BALL_DETECTION",
            Mode::PlayerTracking => "PLAYER_TRACKING",
            Mode::TeamClassification => "TEAM_CLASSIFICATION",
            Mode::Radar => "RADAR",
            Mode::SaveDetection => "SAVE_DETECTION",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Mode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = Mode::ALL.iter().map(|m| m.as_str()).collect();
                anyhow!("unknown mode '{}' (expected one of: {})", s, valid.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_names_loosely() {
        assert_eq!("SAVE_DETECTION".parse::<Mode>().unwrap(), Mode::SaveDetection);
        assert_eq!("save-detection".parse::<Mode>().unwrap(), Mode::SaveDetection);
        assert_eq!(" radar ".parse::<Mode>().unwrap(), Mode::Radar);
        let err = "OFFSIDE".parse::<Mode>().unwrap_err().to_string();
        assert!(err.contains("PLAYER_TRACKING"));
    }

    #[test]
    fn display_round_trips_every_mode() {
        for mode in Mode::ALL {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
        assert_eq!(Mode::default(), Mode::PlayerDetection);
    }
}

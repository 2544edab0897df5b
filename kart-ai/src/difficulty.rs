use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::look_ahead::LOOK_AHEAD_NODES;

/// How to steer when the road ahead is predicted to run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTactic {
    /// Only steer back inside the corridor near the predicted crash.
    AvoidTrackCrash,
    /// Stay parallel to the road.
    Parallel,
    /// Drive at the farthest point reachable in a straight line.
    FarthestPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTactic {
    /// Fire once an item has been held for ten seconds.
    TenSeconds,
    /// Aim, check for space and teammates before firing.
    Calculate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NitroLevel {
    None,
    Some,
    All,
}

/// Preset skill levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn profile(self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => DifficultyProfile {
                start_delay_min: 0.0,
                start_delay_max: 0.5,
                min_look_ahead_steps: 0,
                fallback_tactic: FallbackTactic::AvoidTrackCrash,
                item_tactic: ItemTactic::TenSeconds,
                wait_for_players: true,
                handicap_accel: 0.9,
                skidding_threshold: 4.0,
                handle_bomb: false,
                nitro_level: NitroLevel::None,
            },
            Difficulty::Medium => DifficultyProfile {
                start_delay_min: 0.0,
                start_delay_max: 0.4,
                min_look_ahead_steps: 1,
                fallback_tactic: FallbackTactic::Parallel,
                item_tactic: ItemTactic::Calculate,
                wait_for_players: true,
                handicap_accel: 0.95,
                skidding_threshold: 3.0,
                handle_bomb: true,
                nitro_level: NitroLevel::Some,
            },
            Difficulty::Hard => DifficultyProfile {
                start_delay_min: 0.0,
                start_delay_max: 0.1,
                min_look_ahead_steps: 2,
                fallback_tactic: FallbackTactic::FarthestPoint,
                item_tactic: ItemTactic::Calculate,
                wait_for_players: false,
                handicap_accel: 1.0,
                skidding_threshold: 2.0,
                handle_bomb: true,
                nitro_level: NitroLevel::All,
            },
        }
    }
}

impl FromStr for Difficulty {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ProfileError::UnknownDifficulty(s.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

/// Tuning bundle chosen once per controller. Pure data.
///
/// Fields missing from a TOML profile take the `medium` preset's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyProfile {
    /// Lower bound of the random launch delay, seconds.
    pub start_delay_min: f32,
    /// Upper bound of the random launch delay, seconds.
    pub start_delay_max: f32,
    /// Smallest crash-check horizon. `0` disables crash prediction,
    /// `1` only checks where the kart is now.
    pub min_look_ahead_steps: usize,
    pub fallback_tactic: FallbackTactic,
    pub item_tactic: ItemTactic,
    /// Apply `handicap_accel` while ahead of every human.
    pub wait_for_players: bool,
    /// Throttle ceiling in `0.0..=1.0` used by `wait_for_players`.
    pub handicap_accel: f32,
    /// Skid once the demanded steering exceeds this many times full lock.
    pub skidding_threshold: f32,
    /// Try to pass a held bomb to a kart behind.
    pub handle_bomb: bool,
    pub nitro_level: NitroLevel,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Difficulty::Medium.profile()
    }
}

impl DifficultyProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(0.0..=1.0).contains(&self.handicap_accel) {
            return Err(ProfileError::HandicapOutOfRange(self.handicap_accel));
        }
        if !(self.start_delay_min >= 0.0 && self.start_delay_min <= self.start_delay_max) {
            return Err(ProfileError::StartDelay {
                min: self.start_delay_min,
                max: self.start_delay_max,
            });
        }
        if !(self.skidding_threshold > 0.0) {
            return Err(ProfileError::SkiddingThreshold(self.skidding_threshold));
        }
        if self.min_look_ahead_steps > LOOK_AHEAD_NODES {
            return Err(ProfileError::LookAheadSteps {
                steps: self.min_look_ahead_steps,
                max: LOOK_AHEAD_NODES,
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML profile.
    pub fn from_toml(text: &str) -> Result<Self, ProfileError> {
        let profile: Self = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            difficulty.profile().validate().unwrap();
        }
    }

    #[test]
    fn only_easy_disables_crash_checks() {
        assert_eq!(Difficulty::Easy.profile().min_look_ahead_steps, 0);
        assert!(Difficulty::Medium.profile().min_look_ahead_steps > 0);
        assert!(Difficulty::Hard.profile().min_look_ahead_steps > 0);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(Difficulty::Easy.to_string(), "easy");
        assert!("brutal".parse::<Difficulty>().is_err());
    }

    #[test]
    fn toml_profile_fills_missing_fields_from_medium() {
        let profile = DifficultyProfile::from_toml(
            r#"
            fallback_tactic = "farthest_point"
            nitro_level = "all"
            min_look_ahead_steps = 3
            "#,
        )
        .unwrap();
        assert_eq!(profile.fallback_tactic, FallbackTactic::FarthestPoint);
        assert_eq!(profile.nitro_level, NitroLevel::All);
        assert_eq!(profile.min_look_ahead_steps, 3);
        assert_eq!(profile.item_tactic, ItemTactic::Calculate);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            DifficultyProfile::from_toml("handicap_accel = 1.5"),
            Err(ProfileError::HandicapOutOfRange(_))
        ));
        assert!(matches!(
            DifficultyProfile::from_toml("start_delay_min = 2.0\nstart_delay_max = 1.0"),
            Err(ProfileError::StartDelay { .. })
        ));
        assert!(matches!(
            DifficultyProfile::from_toml("fallback_tactic = \"zigzag\""),
            Err(ProfileError::Parse(_))
        ));
        assert!(matches!(
            DifficultyProfile::from_toml("min_look_ahead_steps = 30"),
            Err(ProfileError::LookAheadSteps { steps: 30, max: LOOK_AHEAD_NODES })
        ));
        assert!(DifficultyProfile::from_toml("min_look_ahead_steps = 10").is_ok());
    }
}

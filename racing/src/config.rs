use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use kart_ai::{Difficulty, DifficultyProfile};
use serde::{Deserialize, Serialize};

use crate::physics::KartParams;

/// One kart on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KartEntry {
    pub name: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Full profile; wins over `difficulty` when both are given.
    #[serde(default)]
    pub profile: Option<DifficultyProfile>,
    /// Counted as a human by the other drivers.
    #[serde(default)]
    pub human: bool,
    #[serde(default)]
    pub team: Option<u32>,
}

impl KartEntry {
    pub fn bot(name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            name: name.into(),
            difficulty: Some(difficulty),
            profile: None,
            human: false,
            team: None,
        }
    }

    pub fn profile(&self) -> DifficultyProfile {
        match (&self.profile, self.difficulty) {
            (Some(profile), _) => profile.clone(),
            (None, Some(difficulty)) => difficulty.profile(),
            (None, None) => DifficultyProfile::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub track: Option<PathBuf>,
    pub laps: u32,
    pub seed: u64,
    /// Simulation step, seconds.
    pub dt: f32,
    pub max_ticks: u64,
    /// Seconds between item and nitro handouts.
    pub item_interval: f32,
    pub kart: KartParams,
    pub karts: Vec<KartEntry>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            track: None,
            laps: 3,
            seed: 0,
            dt: 1.0 / 60.0,
            max_ticks: 60 * 60 * 10,
            item_interval: 5.0,
            kart: KartParams::default(),
            karts: default_grid(4, Difficulty::Medium),
        }
    }
}

impl RaceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read race config {}", path.display()))?;
        Self::parse(&text).wrap_err_with(|| format!("invalid race config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.karts.is_empty() {
            bail!("a race needs at least one kart");
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            bail!("dt must be positive, got {}", self.dt);
        }
        if self.laps == 0 {
            bail!("laps must be at least 1");
        }
        for entry in &self.karts {
            entry
                .profile()
                .validate()
                .wrap_err_with(|| format!("kart {:?}", entry.name))?;
        }
        Ok(())
    }
}

/// `count` bots named after their grid slot.
pub fn default_grid(count: usize, difficulty: Difficulty) -> Vec<KartEntry> {
    (1..=count)
        .map(|slot| KartEntry::bot(format!("{difficulty}-{slot}"), difficulty))
        .collect()
}

#[cfg(test)]
mod tests {
    use kart_ai::{FallbackTactic, NitroLevel};

    use super::*;

    #[test]
    fn parses_karts_with_presets_and_profiles() {
        let config = RaceConfig::parse(
            r#"
            laps = 2
            seed = 42

            [[karts]]
            name = "easy bot"
            difficulty = "easy"

            [[karts]]
            name = "custom"
            human = true
            team = 1
            [karts.profile]
            fallback_tactic = "farthest_point"
            nitro_level = "none"
            "#,
        )
        .unwrap();
        assert_eq!(config.laps, 2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.karts.len(), 2);
        assert_eq!(config.karts[0].profile(), Difficulty::Easy.profile());
        let custom = config.karts[1].profile();
        assert_eq!(custom.fallback_tactic, FallbackTactic::FarthestPoint);
        assert_eq!(custom.nitro_level, NitroLevel::None);
        assert!(config.karts[1].human);
        assert_eq!(config.karts[1].team, Some(1));
    }

    #[test]
    fn defaults_fill_a_grid() {
        let config = RaceConfig::parse("laps = 1").unwrap();
        assert_eq!(config.karts.len(), 4);
        assert_eq!(config.karts[2].name, "medium-3");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(RaceConfig::parse("dt = 0.0").is_err());
        assert!(RaceConfig::parse("laps = 0").is_err());
        assert!(
            RaceConfig::parse(
                r#"
                [[karts]]
                name = "broken"
                [karts.profile]
                handicap_accel = 3.0
                "#
            )
            .is_err()
        );
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::clock::Millis;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Every tunable of the monitor. The weights and caps are heuristic
/// configuration constants, not validated coefficients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub schedule: ScheduleConfig,
    pub pulse: PulseConfig,
    pub temperature: TemperatureConfig,
    pub piezo: PiezoConfig,
    pub gsr: GsrConfig,
    pub baseline: BaselineConfig,
    pub score: ScoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Period of the baseline-accumulation / scoring tick
    pub evaluation_ms: Millis,
    /// Period of the status render
    pub display_ms: Millis,
    /// Period of the diagnostics stream once scoring is active
    pub diagnostics_ms: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Raw intensity above which a finger is considered present
    pub contact_threshold: u16,
    pub min_bpm: f32,
    pub max_bpm: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub conversion_period_ms: Millis,
    pub min_valid_c: f32,
    pub max_valid_c: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiezoConfig {
    pub sample_period_ms: Millis,
    pub window_ms: Millis,
    /// Reads averaged once at start-up to seed the slow baseline
    pub startup_samples: u32,
    pub baseline_weight: f32,
    pub attack_weight: f32,
    pub release_weight: f32,
    /// A sample is "active" when envelope > active_ratio x baseline envelope
    pub active_ratio: f32,
    pub movement_spikes: u32,
    pub high_peak: f32,
    pub high_ratio_pct: f32,
    pub high_active_ms: Millis,
    pub high_active_ratio_pct: f32,
    pub medium_peak: f32,
    pub medium_ratio_pct: f32,
    pub medium_active_ms: Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GsrConfig {
    pub sample_period_ms: Millis,
    /// Rapid analog reads averaged into one sample
    pub reads_per_sample: u32,
    pub calibration_ms: Millis,
    pub tonic_weight: f32,
    pub phasic_weight: f32,
    /// Phasic value mapped to a 100 target
    pub phasic_full_scale: f32,
    pub score_smoothing: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub samples: u32,
    /// Floor for the resting piezo envelope, keeps ratios finite
    pub min_piezo_envelope: f32,
    pub spike_threshold_floor: f32,
    pub spike_threshold_gain: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub bpm_weight: f32,
    pub temp_weight: f32,
    pub piezo_medium_base: f32,
    pub piezo_high_base: f32,
    pub piezo_peak_cap: f32,
    pub piezo_peak_divisor: f32,
    pub piezo_cap: f32,
    pub gsr_cap: f32,
    pub max_score: f32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            evaluation_ms: 1_000,
            display_ms: 500,
            diagnostics_ms: 1_000,
        }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            contact_threshold: 550,
            min_bpm: 45.0,
            max_bpm: 120.0,
        }
    }
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            conversion_period_ms: 1_000,
            min_valid_c: -55.0,
            max_valid_c: 125.0,
        }
    }
}

impl Default for PiezoConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 10,
            window_ms: 5_000,
            startup_samples: 100,
            baseline_weight: 0.0005,
            attack_weight: 0.3,
            release_weight: 0.03,
            active_ratio: 2.0,
            movement_spikes: 8,
            high_peak: 25.0,
            high_ratio_pct: 300.0,
            high_active_ms: 1_500,
            high_active_ratio_pct: 200.0,
            medium_peak: 15.0,
            medium_ratio_pct: 200.0,
            medium_active_ms: 800,
        }
    }
}

impl Default for GsrConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 120,
            reads_per_sample: 15,
            calibration_ms: 60_000,
            tonic_weight: 0.002,
            phasic_weight: 0.15,
            phasic_full_scale: 40.0,
            score_smoothing: 0.05,
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            samples: 30,
            min_piezo_envelope: 1.0,
            spike_threshold_floor: 20.0,
            spike_threshold_gain: 10.0,
        }
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            bpm_weight: 2.0,
            temp_weight: 20.0,
            piezo_medium_base: 15.0,
            piezo_high_base: 30.0,
            piezo_peak_cap: 60.0,
            piezo_peak_divisor: 3.0,
            piezo_cap: 40.0,
            gsr_cap: 30.0,
            max_score: 100.0,
        }
    }
}

impl StressConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: StressConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    /// Variables are prefixed with STRESSFUSE_, e.g. STRESSFUSE_GSR_CALIBRATION_MS=30000
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. User config file (if exists)
    /// 3. Built-in defaults (lowest priority)
    pub fn load_layered(user_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = StressConfig::default();

        if let Some(path) = user_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        env_override("STRESSFUSE_EVALUATION_MS", &mut self.schedule.evaluation_ms)?;
        env_override("STRESSFUSE_DISPLAY_MS", &mut self.schedule.display_ms)?;
        env_override("STRESSFUSE_DIAGNOSTICS_MS", &mut self.schedule.diagnostics_ms)?;
        env_override(
            "STRESSFUSE_PULSE_CONTACT_THRESHOLD",
            &mut self.pulse.contact_threshold,
        )?;
        env_override("STRESSFUSE_PIEZO_WINDOW_MS", &mut self.piezo.window_ms)?;
        env_override("STRESSFUSE_GSR_CALIBRATION_MS", &mut self.gsr.calibration_ms)?;
        env_override("STRESSFUSE_BASELINE_SAMPLES", &mut self.baseline.samples)?;
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// Float checks are written so that NaN fails them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.schedule;
        if s.evaluation_ms == 0 || s.display_ms == 0 || s.diagnostics_ms == 0 {
            return Err(ConfigError::Validation(
                "schedule periods must be > 0".to_string(),
            ));
        }

        let pl = &self.pulse;
        check_positive("pulse.min_bpm", pl.min_bpm)?;
        check_positive("pulse.max_bpm", pl.max_bpm)?;
        if pl.min_bpm >= pl.max_bpm {
            return Err(ConfigError::Validation(
                "pulse.min_bpm must be < max_bpm".to_string(),
            ));
        }

        let t = &self.temperature;
        if t.conversion_period_ms == 0 {
            return Err(ConfigError::Validation(
                "temperature.conversion_period_ms must be > 0".to_string(),
            ));
        }
        check_finite("temperature.min_valid_c", t.min_valid_c)?;
        check_finite("temperature.max_valid_c", t.max_valid_c)?;
        if t.min_valid_c >= t.max_valid_c {
            return Err(ConfigError::Validation(
                "temperature.min_valid_c must be < max_valid_c".to_string(),
            ));
        }

        let p = &self.piezo;
        if p.sample_period_ms == 0 || p.window_ms < p.sample_period_ms {
            return Err(ConfigError::Validation(
                "piezo.window_ms must span at least one sample period".to_string(),
            ));
        }
        if p.startup_samples == 0 || p.movement_spikes == 0 {
            return Err(ConfigError::Validation(
                "piezo.startup_samples and movement_spikes must be > 0".to_string(),
            ));
        }
        for (name, w) in [
            ("piezo.baseline_weight", p.baseline_weight),
            ("piezo.attack_weight", p.attack_weight),
            ("piezo.release_weight", p.release_weight),
        ] {
            check_weight(name, w)?;
        }
        check_positive("piezo.active_ratio", p.active_ratio)?;
        for (name, v) in [
            ("piezo.high_peak", p.high_peak),
            ("piezo.high_ratio_pct", p.high_ratio_pct),
            ("piezo.high_active_ratio_pct", p.high_active_ratio_pct),
            ("piezo.medium_peak", p.medium_peak),
            ("piezo.medium_ratio_pct", p.medium_ratio_pct),
        ] {
            check_non_negative(name, v)?;
        }

        let g = &self.gsr;
        if g.sample_period_ms == 0 || g.reads_per_sample == 0 || g.calibration_ms == 0 {
            return Err(ConfigError::Validation(
                "gsr periods and read counts must be > 0".to_string(),
            ));
        }
        check_positive("gsr.phasic_full_scale", g.phasic_full_scale)?;
        for (name, w) in [
            ("gsr.tonic_weight", g.tonic_weight),
            ("gsr.phasic_weight", g.phasic_weight),
            ("gsr.score_smoothing", g.score_smoothing),
        ] {
            check_weight(name, w)?;
        }

        let b = &self.baseline;
        if b.samples == 0 {
            return Err(ConfigError::Validation(
                "baseline.samples must be > 0".to_string(),
            ));
        }
        check_positive("baseline.min_piezo_envelope", b.min_piezo_envelope)?;
        check_non_negative("baseline.spike_threshold_floor", b.spike_threshold_floor)?;
        check_non_negative("baseline.spike_threshold_gain", b.spike_threshold_gain)?;

        let sc = &self.score;
        for (name, v) in [
            ("score.max_score", sc.max_score),
            ("score.piezo_cap", sc.piezo_cap),
            ("score.piezo_peak_cap", sc.piezo_peak_cap),
            ("score.gsr_cap", sc.gsr_cap),
            ("score.piezo_peak_divisor", sc.piezo_peak_divisor),
        ] {
            check_positive(name, v)?;
        }
        for (name, v) in [
            ("score.bpm_weight", sc.bpm_weight),
            ("score.temp_weight", sc.temp_weight),
            ("score.piezo_medium_base", sc.piezo_medium_base),
            ("score.piezo_high_base", sc.piezo_high_base),
        ] {
            check_non_negative(name, v)?;
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn check_weight(name: &str, w: f32) -> Result<(), ConfigError> {
    if w > 0.0 && w <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{} must be in (0, 1], got {}",
            name, w
        )))
    }
}

fn check_finite(name: &str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{} must be finite, got {}", name, v)))
    }
}

fn check_positive(name: &str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{} must be positive, got {}", name, v)))
    }
}

fn check_non_negative(name: &str, v: f32) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{} must be >= 0, got {}",
            name, v
        )))
    }
}

/// Unset variables leave `slot` alone; a set but non-UTF-8 variable is an error.
fn env_override<T: FromStr>(name: &str, slot: &mut T) -> Result<(), ConfigError> {
    let val = match std::env::var(name) {
        Ok(val) => val,
        Err(std::env::VarError::NotPresent) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    *slot = val
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid {}", name)))?;
    log::info!("{} overridden from environment", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_valid() {
        assert!(StressConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_inverted_bpm_bounds() {
        let mut config = StressConfig::default();
        config.pulse.min_bpm = 130.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_weights() {
        let mut config = StressConfig::default();
        config.gsr.tonic_weight = 0.0;
        assert!(config.validate().is_err());

        let mut config = StressConfig::default();
        config.piezo.attack_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_periods() {
        let mut config = StressConfig::default();
        config.schedule.display_ms = 0;
        assert!(config.validate().is_err());

        let mut config = StressConfig::default();
        config.baseline.samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [gsr]
            calibration_ms = 30000

            [score]
            bpm_weight = 1.5
        "#;
        let config: StressConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gsr.calibration_ms, 30_000);
        assert_eq!(config.gsr.sample_period_ms, 120);
        assert_eq!(config.score.bpm_weight, 1.5);
        assert_eq!(config.baseline.samples, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let mut config = StressConfig::default();
        config.piezo.window_ms = 4_000;

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = StressConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.piezo.window_ms, 4_000);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[baseline]\nsamples = 0").unwrap();
        let result = StressConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_override_parse_error() {
        let mut slot: u32 = 5;
        std::env::set_var("STRESSFUSE_TEST_ONLY_BAD", "not-a-number");
        let result = env_override("STRESSFUSE_TEST_ONLY_BAD", &mut slot);
        std::env::remove_var("STRESSFUSE_TEST_ONLY_BAD");
        assert!(result.is_err());
        assert_eq!(slot, 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_env_override_non_utf8_is_env_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut slot: u32 = 5;
        std::env::set_var("STRESSFUSE_TEST_ONLY_BYTES", OsStr::from_bytes(&[0x66, 0xff]));
        let result = env_override("STRESSFUSE_TEST_ONLY_BYTES", &mut slot);
        std::env::remove_var("STRESSFUSE_TEST_ONLY_BYTES");
        assert!(matches!(result, Err(ConfigError::EnvVar(_))));
        assert_eq!(slot, 5);
    }

    #[test]
    fn test_validation_rejects_nan_and_negative_caps() {
        for toml_str in [
            "[score]\ngsr_cap = nan",
            "[score]\nmax_score = nan",
            "[score]\npiezo_cap = nan",
            "[score]\npiezo_peak_cap = -1.0",
            "[score]\npiezo_peak_cap = nan",
            "[score]\nbpm_weight = -2.0",
            "[pulse]\nmin_bpm = nan",
            "[pulse]\nmax_bpm = nan",
            "[piezo]\nactive_ratio = nan",
            "[baseline]\nmin_piezo_envelope = nan",
            "[temperature]\nmax_valid_c = inf",
        ] {
            let config: StressConfig = toml::from_str(toml_str).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "accepted {:?}",
                toml_str
            );
        }
    }

    #[test]
    fn test_validated_config_never_panics_scoring() {
        use crate::calibration::baseline::Baseline;
        use crate::channels::piezo::PiezoLevel;
        use crate::score::{piezo_contribution, ScoreAggregator, ScoreInputs};

        let config: StressConfig = toml::from_str("[score]\ngsr_cap = 12.5").unwrap();
        config.validate().unwrap();
        assert_eq!(
            piezo_contribution(PiezoLevel::Medium, 10.0, &config.score),
            15.0 + 10.0 / 3.0
        );
        let mut agg = ScoreAggregator::new(config.score.clone());
        let baseline = Baseline {
            bpm: 70.0,
            temp_c: 36.5,
            piezo_envelope: 1.0,
            spike_threshold: 20.0,
        };
        let b = agg.compute(
            &baseline,
            &ScoreInputs {
                bpm_avg: Some(70.0),
                temp_c: Some(36.5),
                piezo_level: PiezoLevel::Normal,
                piezo_window_max: 0.0,
                gsr_contribution: 100.0,
            },
        );
        assert_eq!(b.gsr_term, 12.5);
    }

    #[test]
    fn test_load_layered_without_file_is_default() {
        let config = StressConfig::load_layered(None).unwrap();
        assert_eq!(config.schedule.evaluation_ms, 1_000);
    }
}

//! Synth configuration, loaded from JSON with every field defaulted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsp::bank::{HarmonicBank, Normalization, RenderSettings};
use crate::dsp::renderer::WavHeader;
use crate::dsp::tuning::{KeyMap, OctaveConvention, PitchTable, ToneCalculator};
use crate::error::{BankError, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Frequency of harmonic 1; harmonic k sits at `k * fundamental`.
    pub fundamental: f64,
    pub harmonics: usize,
    pub normalization: Normalization,
    /// Directory rendered files are written to.
    pub output_dir: PathBuf,
    /// File stem used when a render command names no file.
    pub default_name: String,
    /// Octave used for note-on lookups until changed by the channel.
    pub octave: i32,
    pub octave_convention: OctaveConvention,
    pub fifo_path: PathBuf,
    pub pitches: PitchTable,
    pub keys: KeyMap,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            sample_rate: 44100,
            duration_secs: 2.0,
            fundamental: 440.0,
            harmonics: 32,
            normalization: Normalization::Sounding,
            output_dir: PathBuf::from("generated"),
            default_name: "harmonic_wave".to_string(),
            octave: 4,
            octave_convention: OctaveConvention::EqualTempered,
            fifo_path: PathBuf::from("/tmp/pipe_frequency"),
            pitches: PitchTable::default(),
            keys: KeyMap::default(),
        }
    }
}

impl SynthConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SynthConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => SynthConfig::load(p),
            None => Ok(SynthConfig::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if !(self.duration_secs.is_finite() && self.duration_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "duration_secs must be a non-negative number, got {}",
                self.duration_secs
            )));
        }
        // Every render must fit the 32-bit size fields of its WAV header
        WavHeader::for_settings(&self.render_settings()).map_err(|e| {
            ConfigError::Invalid(format!(
                "{} Hz for {} s cannot be written as WAV: {e}",
                self.sample_rate, self.duration_secs
            ))
        })?;
        if self.harmonics == 0 {
            return Err(ConfigError::Invalid("harmonics must be at least 1".into()));
        }
        if !(self.fundamental.is_finite() && self.fundamental > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fundamental must be positive, got {}",
                self.fundamental
            )));
        }
        if self.default_name.is_empty() {
            return Err(ConfigError::Invalid("default_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            sample_rate: self.sample_rate,
            duration_secs: self.duration_secs,
            normalization: self.normalization,
        }
    }

    pub fn tone_calculator(&self) -> ToneCalculator {
        ToneCalculator {
            pitches: self.pitches.clone(),
            keys: self.keys.clone(),
            convention: self.octave_convention,
        }
    }

    pub fn bank(&self) -> Result<HarmonicBank, BankError> {
        HarmonicBank::new(self.harmonics, self.fundamental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = SynthConfig::default();
        config.validate().unwrap();
        assert_eq!(config.render_settings().sample_count(), 88200);
        assert_eq!(config.bank().unwrap().len(), 32);
        assert_eq!(config.tone_calculator().frequency("a", config.octave), Ok(440.0));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.json");
        fs::write(
            &path,
            r#"{ "harmonics": 8, "octave_convention": "legacy", "normalization": "bank_size" }"#,
        )
        .unwrap();
        let config = SynthConfig::load(&path).unwrap();
        assert_eq!(config.harmonics, 8);
        assert_eq!(config.octave_convention, OctaveConvention::Legacy);
        assert_eq!(config.normalization, Normalization::BankSize);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.fifo_path, PathBuf::from("/tmp/pipe_frequency"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.json");
        fs::write(&path, r#"{ "harmonics": 0 }"#).unwrap();
        assert!(matches!(SynthConfig::load(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "{ harmonics").unwrap();
        assert!(matches!(SynthConfig::load(&path), Err(ConfigError::Parse { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(SynthConfig::load(&missing), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn formats_beyond_wav_limits_are_rejected() {
        let huge_rate = SynthConfig {
            sample_rate: 3_000_000_000,
            duration_secs: 0.0,
            ..SynthConfig::default()
        };
        assert!(matches!(huge_rate.validate(), Err(ConfigError::Invalid(_))));

        // About 13.5 hours at 44.1 kHz is the most a 4 GiB data chunk holds
        let long = SynthConfig {
            duration_secs: 48_000.0,
            ..SynthConfig::default()
        };
        assert!(long.validate().is_ok());
        let too_long = SynthConfig {
            duration_secs: 49_000.0,
            ..SynthConfig::default()
        };
        assert!(matches!(too_long.validate(), Err(ConfigError::Invalid(_))));
    }
}

//! Harmonic bank: sums a fixed set of harmonics into 16-bit PCM.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BankError;

use super::shape::WaveShape;

/// Largest magnitude a rendered sample may take.
pub const SAMPLE_CEILING: f64 = 32767.0;

/// One additive oscillator component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    frequency: f64,
    amplitude: f64,
    #[serde(default)]
    shape: WaveShape,
}

impl Harmonic {
    /// A silent sine harmonic.
    pub fn new(frequency: f64) -> Result<Self, BankError> {
        Harmonic::with_params(frequency, 0.0, WaveShape::default())
    }

    pub fn with_params(frequency: f64, amplitude: f64, shape: WaveShape) -> Result<Self, BankError> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(BankError::InvalidFrequency(frequency));
        }
        Ok(Harmonic {
            frequency,
            amplitude: clamp_amplitude(amplitude)?,
            shape: normalize_shape(shape)?,
        })
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn shape(&self) -> WaveShape {
        self.shape
    }

    /// This harmonic's contribution at time `t` (seconds).
    pub fn sample(&self, t: f64) -> f64 {
        self.shape.sample(t, self.frequency, self.amplitude)
    }

    pub fn is_sounding(&self) -> bool {
        self.amplitude > 0.0
    }
}

/// Divisor applied to the summed harmonics before quantization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Average over harmonics with non-zero amplitude (at least 1). A lone
    /// harmonic plays at full scale, but the gain of every other harmonic
    /// steps whenever one crosses zero amplitude: raising a second one
    /// halves the level of the first.
    #[default]
    Sounding,
    /// Average over every harmonic in the bank.
    BankSize,
}

/// Output format of a render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub duration_secs: f64,
    #[serde(default)]
    pub normalization: Normalization,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            sample_rate: 44100,
            duration_secs: 2.0,
            normalization: Normalization::default(),
        }
    }
}

impl RenderSettings {
    /// Number of samples a render produces: `round(sample_rate * duration)`.
    /// Non-finite or negative durations produce nothing.
    pub fn sample_count(&self) -> usize {
        let n = self.sample_rate as f64 * self.duration_secs;
        if n.is_finite() && n > 0.0 { n.round() as usize } else { 0 }
    }
}

/// Ordered, fixed-size collection of harmonics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HarmonicBank {
    harmonics: Vec<Harmonic>,
}

impl HarmonicBank {
    /// `count` silent sine harmonics at `k * fundamental`, k = 1..=count.
    pub fn new(count: usize, fundamental: f64) -> Result<Self, BankError> {
        let harmonics = (1..=count)
            .map(|k| Harmonic::new(fundamental * k as f64))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HarmonicBank { harmonics })
    }

    pub fn from_harmonics(harmonics: Vec<Harmonic>) -> Self {
        HarmonicBank { harmonics }
    }

    /// Load a JSON snapshot, re-checking every harmonic's invariants.
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let raw: Vec<Harmonic> =
            serde_json::from_str(json).map_err(|e| BankError::InvalidSnapshot(e.to_string()))?;
        let harmonics = raw
            .into_iter()
            .map(|h| Harmonic::with_params(h.frequency, h.amplitude, h.shape))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HarmonicBank { harmonics })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.harmonics).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.harmonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harmonics.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Harmonic> {
        self.harmonics.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Harmonic> {
        self.harmonics.iter()
    }

    /// Set a harmonic's amplitude, clamped into `[0, 1]`.
    pub fn set_amplitude(&mut self, index: usize, value: f64) -> Result<f64, BankError> {
        let amplitude = clamp_amplitude(value)?;
        self.slot(index)?.amplitude = amplitude;
        Ok(amplitude)
    }

    pub fn set_shape(&mut self, index: usize, shape: WaveShape) -> Result<WaveShape, BankError> {
        let shape = normalize_shape(shape)?;
        self.slot(index)?.shape = shape;
        Ok(shape)
    }

    /// Switch a harmonic to morph mode at `mix`, clamped into `[0, 100]`.
    pub fn set_mix(&mut self, index: usize, mix: f64) -> Result<WaveShape, BankError> {
        self.set_shape(index, WaveShape::Morph(mix))
    }

    fn slot(&mut self, index: usize) -> Result<&mut Harmonic, BankError> {
        let len = self.harmonics.len();
        self.harmonics
            .get_mut(index)
            .ok_or(BankError::OutOfRange { index, len })
    }

    /// Number of harmonics with non-zero amplitude.
    pub fn sounding(&self) -> usize {
        self.harmonics.iter().filter(|h| h.is_sounding()).count()
    }

    fn divisor(&self, normalization: Normalization) -> f64 {
        let n = match normalization {
            Normalization::Sounding => self.sounding(),
            Normalization::BankSize => self.harmonics.len(),
        };
        n.max(1) as f64
    }

    /// Unnormalized sum of all harmonic contributions at time `t`.
    pub fn mix_at(&self, t: f64) -> f64 {
        self.harmonics
            .iter()
            .filter(|h| h.is_sounding())
            .map(|h| h.sample(t))
            .sum()
    }

    /// Render `settings.sample_count()` mono samples.
    pub fn render(&self, settings: &RenderSettings) -> Vec<i16> {
        let count = settings.sample_count();
        let sr = settings.sample_rate as f64;
        let divisor = self.divisor(settings.normalization);
        debug!(
            samples = count,
            sounding = self.sounding(),
            divisor,
            "rendering harmonic bank"
        );

        (0..count)
            .map(|i| {
                let t = i as f64 / sr;
                quantize(self.mix_at(t) / divisor)
            })
            .collect()
    }
}

/// Clamp into `[-1, 1]` and scale to the int16 ceiling.
pub fn quantize(mixed: f64) -> i16 {
    (mixed.clamp(-1.0, 1.0) * SAMPLE_CEILING).round() as i16
}

fn clamp_amplitude(value: f64) -> Result<f64, BankError> {
    if value.is_nan() {
        return Err(BankError::NotANumber { param: "amplitude", value });
    }
    Ok(value.clamp(0.0, 1.0))
}

fn normalize_shape(shape: WaveShape) -> Result<WaveShape, BankError> {
    match shape {
        WaveShape::Pure(_) => Ok(shape),
        WaveShape::Morph(mix) => {
            WaveShape::morph(mix).ok_or(BankError::NotANumber { param: "mix", value: mix })
        }
    }
}

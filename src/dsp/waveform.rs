//! Waveform math: stateless per-shape sample functions.
//!
//! Every shape peaks at `amplitude`, so shapes can be cross-faded without
//! changing loudness. All functions are total for finite input: the points
//! where the naive formulas divide by zero or leave the `asin` domain are
//! mapped to explicit values instead of NaN.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Below this magnitude a sine or slope term counts as a zero crossing.
const ZERO_CROSSING: f64 = 1e-9;

/// Supported waveform shapes, in blend-cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Sawtooth,
    ];

    /// Sample this shape at time `t` (seconds).
    pub fn sample(self, t: f64, frequency: f64, amplitude: f64) -> f64 {
        match self {
            Waveform::Sine => sine(t, frequency, amplitude),
            Waveform::Square => square(t, frequency, amplitude),
            Waveform::Triangle => triangle(t, frequency, amplitude),
            Waveform::Sawtooth => sawtooth(t, frequency, amplitude),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(Waveform::Sine),
            "square" | "sq" => Ok(Waveform::Square),
            "triangle" | "tri" => Ok(Waveform::Triangle),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            other => Err(format!("unknown waveform '{other}'")),
        }
    }
}

pub fn sine(t: f64, frequency: f64, amplitude: f64) -> f64 {
    amplitude * (2.0 * PI * frequency * t).sin()
}

/// Sign of the sine term. Exactly 0 at the sine's zero crossings.
pub fn square(t: f64, frequency: f64, amplitude: f64) -> f64 {
    let s = (2.0 * PI * frequency * t).sin();
    if s.abs() < ZERO_CROSSING {
        0.0
    } else {
        amplitude * s.signum()
    }
}

pub fn triangle(t: f64, frequency: f64, amplitude: f64) -> f64 {
    let s = (2.0 * PI * frequency * t).sin().clamp(-1.0, 1.0);
    2.0 * amplitude * s.asin() / PI
}

/// Rising ramp built from a half-rate triangle folded by the sign of its
/// slope. Output is 0 where the slope term vanishes (the ramp's reset).
pub fn sawtooth(t: f64, frequency: f64, amplitude: f64) -> f64 {
    let half_rate = triangle(t, frequency / 2.0, amplitude);
    let slope = (PI * frequency * t).cos();
    if slope.abs() < ZERO_CROSSING {
        0.0
    } else {
        half_rate * slope.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn sweep(shape: Waveform, freq: f64, amp: f64) -> Vec<f64> {
        (0..44100).map(|i| shape.sample(i as f64 / SR, freq, amp)).collect()
    }

    #[test]
    fn sine_zero_at_start() {
        let s = sine(0.0, 440.0, 1.0);
        assert!(s.abs() < 1e-12, "Sine should start at 0, got {s}");
    }

    #[test]
    fn all_shapes_stay_within_amplitude() {
        for shape in Waveform::ALL {
            for s in sweep(shape, 440.0, 0.7) {
                assert!(s.is_finite(), "{shape} produced {s}");
                assert!(s.abs() <= 0.7 + 1e-9, "{shape} out of range: {s}");
            }
        }
    }

    #[test]
    fn square_is_zero_on_crossings() {
        assert_eq!(square(0.0, 440.0, 1.0), 0.0);
        // Half a period of 100 Hz
        assert_eq!(square(0.005, 100.0, 1.0), 0.0);
        assert_eq!(square(0.001, 100.0, 0.5), 0.5);
        assert_eq!(square(0.006, 100.0, 0.5), -0.5);
    }

    #[test]
    fn triangle_peaks_at_quarter_period() {
        let peak = triangle(0.0025, 100.0, 1.0);
        assert!((peak - 1.0).abs() < 1e-6, "got {peak}");
        let mid = triangle(0.00125, 100.0, 1.0);
        assert!((mid - 0.5).abs() < 1e-6, "triangle should be linear, got {mid}");
    }

    #[test]
    fn sawtooth_ramps_up_within_a_period() {
        let f = 100.0;
        // First half of the period ramps 0 → 1
        let a = sawtooth(0.001, f, 1.0);
        let b = sawtooth(0.003, f, 1.0);
        assert!((a - 0.2).abs() < 1e-6, "got {a}");
        assert!((b - 0.6).abs() < 1e-6, "got {b}");
        // Second half continues from -1 back toward 0
        let c = sawtooth(0.006, f, 1.0);
        assert!((c + 0.8).abs() < 1e-6, "got {c}");
    }

    #[test]
    fn sawtooth_reset_is_zero_not_nan() {
        // The slope vanishes at half a period of the ramp
        let s = sawtooth(0.005, 100.0, 1.0);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn sawtooth_has_requested_period() {
        let f = 441.0;
        let period = (SR / f) as usize;
        let a = sawtooth(7.0 / SR, f, 1.0);
        let b = sawtooth((7 + period) as f64 / SR, f, 1.0);
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }

    #[test]
    fn parse_waveform_names() {
        assert_eq!("saw".parse::<Waveform>(), Ok(Waveform::Sawtooth));
        assert_eq!(" Triangle ".parse::<Waveform>(), Ok(Waveform::Triangle));
        assert!("noise".parse::<Waveform>().is_err());
    }
}

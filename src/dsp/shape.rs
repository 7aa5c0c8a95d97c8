//! Shape morphing along the cycle sine → square → triangle → sawtooth → sine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::waveform::Waveform;

/// Upper end of the morph scale.
pub const MIX_MAX: f64 = 100.0;

/// Ordered breakpoints of the morph cycle. Between two neighbours the
/// output cross-fades linearly from the left shape to the right one.
pub const SHAPE_CYCLE: [(f64, Waveform); 5] = [
    (0.0, Waveform::Sine),
    (25.0, Waveform::Square),
    (50.0, Waveform::Triangle),
    (75.0, Waveform::Sawtooth),
    (100.0, Waveform::Sine),
];

/// How a harmonic picks its waveform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum WaveShape {
    /// One pure shape.
    Pure(Waveform),
    /// Position on the morph cycle, in `[0, 100]`.
    Morph(f64),
}

impl Default for WaveShape {
    fn default() -> Self {
        WaveShape::Pure(Waveform::Sine)
    }
}

impl WaveShape {
    /// Build a morph position, clamping into `[0, 100]`. NaN yields `None`.
    pub fn morph(mix: f64) -> Option<Self> {
        if mix.is_nan() {
            None
        } else {
            Some(WaveShape::Morph(mix.clamp(0.0, MIX_MAX)))
        }
    }

    pub fn sample(&self, t: f64, frequency: f64, amplitude: f64) -> f64 {
        match *self {
            WaveShape::Pure(w) => w.sample(t, frequency, amplitude),
            WaveShape::Morph(mix) => {
                let (from, to, weight) = blend_segment(mix);
                let a = from.sample(t, frequency, amplitude);
                if weight == 0.0 {
                    return a;
                }
                let b = to.sample(t, frequency, amplitude);
                a + (b - a) * weight
            }
        }
    }
}

impl fmt::Display for WaveShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveShape::Pure(w) => write!(f, "{w}"),
            WaveShape::Morph(mix) => write!(f, "morph {mix:.1}"),
        }
    }
}

/// Accepts a waveform name or a morph position.
impl FromStr for WaveShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(mix) = s.parse::<f64>() {
            return WaveShape::morph(mix).ok_or_else(|| format!("invalid morph position '{s}'"));
        }
        s.parse::<Waveform>().map(WaveShape::Pure)
    }
}

/// Locate `mix` on the cycle: the two bracketing shapes and the weight of
/// the right-hand one, in `[0, 1]`.
pub fn blend_segment(mix: f64) -> (Waveform, Waveform, f64) {
    let mix = if mix.is_nan() { 0.0 } else { mix.clamp(0.0, MIX_MAX) };
    for pair in SHAPE_CYCLE.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        if mix < end {
            let weight = ((mix - start) / (end - start)).clamp(0.0, 1.0);
            return (from, to, weight);
        }
    }
    // mix == MIX_MAX: the cycle has wrapped back to its first shape
    let last = SHAPE_CYCLE.len() - 1;
    (SHAPE_CYCLE[last - 1].1, SHAPE_CYCLE[last].1, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_weights_move_smoothly() {
        assert_eq!(blend_segment(0.0), (Waveform::Sine, Waveform::Square, 0.0));
        let (from, to, w) = blend_segment(12.5);
        assert_eq!((from, to), (Waveform::Sine, Waveform::Square));
        assert!((w - 0.5).abs() < 1e-12);
        assert_eq!(blend_segment(25.0), (Waveform::Square, Waveform::Triangle, 0.0));
        let (_, _, w) = blend_segment(60.0);
        assert!((w - 0.4).abs() < 1e-12);
        assert_eq!(blend_segment(100.0), (Waveform::Sawtooth, Waveform::Sine, 1.0));
    }

    #[test]
    fn out_of_range_mix_is_clamped() {
        assert_eq!(blend_segment(-5.0), blend_segment(0.0));
        assert_eq!(blend_segment(250.0), blend_segment(100.0));
        assert_eq!(WaveShape::morph(140.0), Some(WaveShape::Morph(100.0)));
        assert_eq!(WaveShape::morph(f64::NAN), None);
    }

    #[test]
    fn morph_endpoints_match_pure_shapes() {
        let t = 0.00037;
        let stops = [
            (0.0, Waveform::Sine),
            (25.0, Waveform::Square),
            (50.0, Waveform::Triangle),
            (75.0, Waveform::Sawtooth),
            (100.0, Waveform::Sine),
        ];
        for (mix, shape) in stops {
            let morphed = WaveShape::Morph(mix).sample(t, 440.0, 0.8);
            let pure = shape.sample(t, 440.0, 0.8);
            assert!((morphed - pure).abs() < 1e-12, "mix {mix}: {morphed} vs {pure}");
        }
    }

    #[test]
    fn blend_is_continuous_across_breakpoint() {
        let amp = 0.9;
        let eps = 0.1 * amp;
        for i in 1..200 {
            let t = i as f64 / 44100.0;
            let at = |mix: f64| WaveShape::Morph(mix).sample(t, 220.0, amp);
            let (a, b, c) = (at(24.0), at(25.0), at(26.0));
            assert!((b - a).abs() <= eps, "jump 24→25 at sample {i}: {a} → {b}");
            assert!((c - b).abs() <= eps, "jump 25→26 at sample {i}: {b} → {c}");
            let (below, above) = (at(24.9999), at(25.0));
            assert!((above - below).abs() < 1e-3, "discontinuity at 25: {below} vs {above}");
        }
    }

    #[test]
    fn parse_shape_payloads() {
        assert_eq!("square".parse::<WaveShape>(), Ok(WaveShape::Pure(Waveform::Square)));
        assert_eq!("37.5".parse::<WaveShape>(), Ok(WaveShape::Morph(37.5)));
        assert_eq!("-3".parse::<WaveShape>(), Ok(WaveShape::Morph(0.0)));
        assert!("wobble".parse::<WaveShape>().is_err());
    }
}

//! Tuning: pitch-class tables and equal-tempered frequency lookup.
//!
//! Frequencies are measured from A4 = 440 Hz:
//! `440 * 2^((distance + (octave - 4) * span) / 12)`, where `distance` is the
//! pitch class's signed semitone offset from A and `span` is the number of
//! semitones per octave step (12, or 13 for the legacy tuning).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ToneError;

/// Reference pitch (A4).
pub const A4_FREQUENCY: f64 = 440.0;
/// Octave the pitch-class distances are measured in.
pub const REFERENCE_OCTAVE: i32 = 4;

const PITCH_CLASSES: [(&str, i32); 12] = [
    ("c", -9),
    ("c#", -8),
    ("d", -7),
    ("d#", -6),
    ("e", -5),
    ("f", -4),
    ("f#", -3),
    ("g", -2),
    ("g#", -1),
    ("a", 0),
    ("a#", 1),
    ("b", 2),
];

/// Bottom keyboard row laid out like a piano octave.
const KEYBOARD: [(&str, &str); 12] = [
    ("z", "c"),
    ("s", "c#"),
    ("x", "d"),
    ("d", "d#"),
    ("c", "e"),
    ("v", "f"),
    ("g", "f#"),
    ("b", "g"),
    ("h", "g#"),
    ("n", "a"),
    ("j", "a#"),
    ("m", "b"),
];

/// Semitones added per octave step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OctaveConvention {
    /// 12 semitones per octave: each octave doubles the frequency.
    #[default]
    EqualTempered,
    /// 13 semitones per octave step, reproducing the slightly sharp octaves
    /// of the first prototype's sound files.
    Legacy,
}

impl OctaveConvention {
    pub fn semitones(self) -> i32 {
        match self {
            OctaveConvention::EqualTempered => 12,
            OctaveConvention::Legacy => 13,
        }
    }
}

/// Pitch-class name → signed semitone distance from A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PitchTable {
    distances: BTreeMap<String, i32>,
}

impl Default for PitchTable {
    fn default() -> Self {
        PitchTable {
            distances: PITCH_CLASSES
                .iter()
                .map(|&(name, d)| (name.to_string(), d))
                .collect(),
        }
    }
}

impl PitchTable {
    /// Case-insensitive lookup.
    pub fn distance(&self, pitch: &str) -> Result<i32, ToneError> {
        self.distances
            .get(&pitch.trim().to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ToneError::UnknownNote(pitch.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.distances.keys().map(String::as_str)
    }
}

/// Keyboard key → pitch-class name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap {
    keys: BTreeMap<String, String>,
}

impl Default for KeyMap {
    fn default() -> Self {
        KeyMap {
            keys: KEYBOARD
                .iter()
                .map(|&(key, pitch)| (key.to_string(), pitch.to_string()))
                .collect(),
        }
    }
}

impl KeyMap {
    pub fn pitch_for(&self, key: &str) -> Result<&str, ToneError> {
        self.keys
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ToneError::UnmappedKey(key.to_string()))
    }
}

/// Immutable tuning configuration, built once and shared by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToneCalculator {
    pub pitches: PitchTable,
    pub keys: KeyMap,
    pub convention: OctaveConvention,
}

impl ToneCalculator {
    pub fn new(convention: OctaveConvention) -> Self {
        ToneCalculator {
            convention,
            ..ToneCalculator::default()
        }
    }

    /// Frequency in Hz of `pitch` in `octave`.
    pub fn frequency(&self, pitch: &str, octave: i32) -> Result<f64, ToneError> {
        let distance = self.pitches.distance(pitch)?;
        Ok(equal_tempered(distance, octave, self.convention))
    }

    /// Resolve a keyboard key to its pitch class and frequency.
    pub fn key_frequency(&self, key: &str, octave: i32) -> Result<(&str, f64), ToneError> {
        let pitch = self.keys.pitch_for(key)?;
        Ok((pitch, self.frequency(pitch, octave)?))
    }
}

/// Frequency of a note `distance` semitones from A in `octave`.
pub fn equal_tempered(distance: i32, octave: i32, convention: OctaveConvention) -> f64 {
    let steps = distance as f64 + ((octave - REFERENCE_OCTAVE) * convention.semitones()) as f64;
    A4_FREQUENCY * 2.0_f64.powf(steps / 12.0)
}

pub mod config;
pub mod control;
pub mod dsp;
pub mod error;
#[cfg(feature = "live")]
pub mod live;
pub mod protocol;

use crate::dsp::bank::{HarmonicBank, Normalization, RenderSettings};
use crate::dsp::tuning::ToneCalculator;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the overtone-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Render a JSON bank snapshot to mono 16-bit WAV bytes.
pub fn render_bank(
    bank_json: &str,
    sample_rate: u32,
    duration_secs: f64,
) -> Result<Vec<u8>, error::OvertoneError> {
    let bank = HarmonicBank::from_json(bank_json)?;
    let settings = RenderSettings {
        sample_rate,
        duration_secs,
        normalization: Normalization::default(),
    };
    dsp::renderer::WavHeader::for_settings(&settings)?;
    let samples = bank.render(&settings);
    Ok(dsp::renderer::encode_wav(&samples, sample_rate, 1)?)
}

/// WASM-exposed: render a JSON bank snapshot to a WAV byte array.
#[wasm_bindgen]
pub fn render_bank_wav(bank_json: &str, sample_rate: u32, duration_secs: f64) -> Result<Vec<u8>, JsValue> {
    render_bank(bank_json, sample_rate, duration_secs).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: a silent sine bank at integer multiples of `fundamental`.
#[wasm_bindgen]
pub fn default_bank(harmonics: usize, fundamental: f64) -> Result<JsValue, JsValue> {
    let bank = HarmonicBank::new(harmonics, fundamental).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&bank).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: equal-tempered frequency of a pitch class in an octave.
#[wasm_bindgen]
pub fn note_frequency(note: &str, octave: i32) -> Result<f64, JsValue> {
    ToneCalculator::default()
        .frequency(note, octave)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_bank_from_json() {
        let json = r#"[
            {"frequency": 220.0, "amplitude": 0.5},
            {"frequency": 440.0, "amplitude": 0.25, "shape": {"mode": "morph", "value": 30.0}}
        ]"#;
        let wav = render_bank(json, 8000, 0.5).unwrap();
        let header = dsp::renderer::WavHeader::parse(&wav).unwrap();
        assert_eq!(header.data_size, 8000);
        assert!(header.is_consistent());
    }

    #[test]
    fn render_bank_rejects_bad_snapshot() {
        assert!(render_bank("[{\"frequency\": 0}]", 8000, 0.1).is_err());
    }

    #[test]
    fn render_bank_rejects_unrepresentable_format() {
        let json = r#"[{"frequency": 220.0, "amplitude": 0.5}]"#;
        let err = render_bank(json, 3_000_000_000, 0.0).unwrap_err();
        assert!(matches!(err, error::OvertoneError::Render(_)), "got {err:?}");
    }
}

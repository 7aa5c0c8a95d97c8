//! Control-line protocol.
//!
//! One command per newline-terminated line, keyed by prefix:
//!
//! ```text
//! sel:<1..N>        select the active harmonic
//! pot:<0..100>      amplitude of the active harmonic, in percent
//! w:<shape|0..100>  pure waveform name or morph position
//! z:<key> / p:<key> note on for a keyboard key
//! r:<key>           note off
//! oct:<n>           octave used for note on
//! generate [name]   render the bank (also `generate_wave:<name>`)
//! q / exit          close the channel
//! ```
//!
//! Lines with an unknown prefix parse to [`Command::Unknown`] so newer
//! senders never break older listeners.

use std::ops::Range;

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

use crate::dsp::shape::WaveShape;
use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 1-based harmonic number, unchecked against the bank size.
    Select(i64),
    /// Amplitude in percent, unclamped.
    Amplitude(f64),
    Shape(WaveShape),
    NoteOn(String),
    NoteOff(String),
    Octave(i32),
    /// Render, optionally to a named file.
    Generate(Option<String>),
    Quit,
    Unknown(String),
}

/// Parse one line. Surrounding whitespace is ignored on the line and payload.
pub fn parse_line(line: &str) -> Result<Command, ProtocolError> {
    let line = line.trim();
    match line {
        "q" | "exit" => return Ok(Command::Quit),
        "generate" => return Ok(Command::Generate(None)),
        _ => {}
    }
    if let Some(rest) = line.strip_prefix("generate ") {
        let start = line.len() - rest.len();
        return generate_name(line, start).map(Command::Generate);
    }

    let Some((prefix, _)) = line.split_once(':') else {
        return Ok(Command::Unknown(line.to_string()));
    };
    let start = prefix.len() + 1;
    let payload = Payload::new(line, start);

    match prefix {
        "sel" => payload.parse::<i64>("harmonic number").map(Command::Select),
        "pot" => payload.number("amplitude percentage").map(Command::Amplitude),
        "w" => payload
            .text()
            .parse::<WaveShape>()
            .map(Command::Shape)
            .map_err(|reason| payload.malformed(reason)),
        "z" | "p" => payload.key().map(Command::NoteOn),
        "r" => payload.key().map(Command::NoteOff),
        "oct" => payload.parse::<i32>("octave").map(Command::Octave),
        "generate_wave" => generate_name(line, start).map(Command::Generate),
        _ => Ok(Command::Unknown(line.to_string())),
    }
}

/// The text after a prefix, with its byte range in the trimmed line.
struct Payload<'a> {
    line: &'a str,
    span: Range<usize>,
}

impl<'a> Payload<'a> {
    fn new(line: &'a str, start: usize) -> Self {
        let raw = &line[start..];
        let lead = raw.len() - raw.trim_start().len();
        let text = raw.trim();
        let begin = start + lead;
        Payload {
            line,
            span: begin..begin + text.len(),
        }
    }

    fn text(&self) -> &'a str {
        &self.line[self.span.clone()]
    }

    fn malformed(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::MalformedCommand {
            line: self.line.to_string(),
            span: self.span.clone(),
            reason: reason.into(),
        }
    }

    fn parse<T: std::str::FromStr>(&self, what: &str) -> Result<T, ProtocolError> {
        self.text()
            .parse::<T>()
            .map_err(|_| self.malformed(format!("expected {what}, found '{}'", self.text())))
    }

    fn number(&self, what: &str) -> Result<f64, ProtocolError> {
        let value = self.parse::<f64>(what)?;
        if value.is_nan() {
            return Err(self.malformed(format!("expected {what}, found NaN")));
        }
        Ok(value)
    }

    fn key(&self) -> Result<String, ProtocolError> {
        if self.text().is_empty() {
            return Err(self.malformed("missing key"));
        }
        Ok(self.text().to_string())
    }
}

fn generate_name(line: &str, start: usize) -> Result<Option<String>, ProtocolError> {
    let payload = Payload::new(line, start);
    let name = payload.text();
    if name.is_empty() {
        return Ok(None);
    }
    // Without separators the name is a single path component
    if name.contains(['/', '\\', '\0']) || name == ".." {
        return Err(payload.malformed("file name must be a single path component"));
    }
    Ok(Some(name.to_string()))
}

/// A malformed line found while checking a control script.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// 1-based line number.
    pub line_no: usize,
    /// Byte offset of the trimmed line within the script.
    pub offset: usize,
    pub error: ProtocolError,
}

/// Parse every line of `script`, collecting the malformed ones.
pub fn check_script(script: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut offset = 0;
    for (i, raw) in script.split_inclusive('\n').enumerate() {
        let lead = raw.len() - raw.trim_start().len();
        if let Err(error) = parse_line(raw) {
            diagnostics.push(Diagnostic {
                line_no: i + 1,
                offset: offset + lead,
                error,
            });
        }
        offset += raw.len();
    }
    diagnostics
}

/// Render a diagnostic against its script as a plain-text report.
pub fn format_diagnostic(name: &str, script: &str, diagnostic: &Diagnostic) -> String {
    let ProtocolError::MalformedCommand { span, reason, .. } = &diagnostic.error;
    let range = diagnostic.offset + span.start..diagnostic.offset + span.end.max(span.start + 1);
    let id = name.to_string();

    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, (id.clone(), range.clone()))
        .with_config(
            Config::default()
                .with_color(false)
                .with_index_type(IndexType::Byte),
        )
        .with_message(format!("malformed command on line {}", diagnostic.line_no))
        .with_label(Label::new((id.clone(), range)).with_message(reason))
        .finish()
        .write((id, Source::from(script)), &mut out);
    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => format!("line {}: {}", diagnostic.line_no, diagnostic.error),
    }
}

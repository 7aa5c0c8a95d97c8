//! Control channel: applies protocol commands to a live harmonic bank.
//!
//! The channel owns the bank, the selected-harmonic cursor and the note-on
//! octave. Commands are applied one at a time; a rejected command leaves
//! every piece of state as it was. Render requests are returned as
//! [`RenderJob`]s holding their own snapshot of the bank, so the caller can
//! run them elsewhere while the channel keeps mutating its copy.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::SynthConfig;
use crate::dsp::bank::{HarmonicBank, RenderSettings};
use crate::dsp::renderer::{RenderReport, render_to_file};
use crate::dsp::shape::WaveShape;
use crate::dsp::tuning::ToneCalculator;
use crate::error::{ControlError, OvertoneError, RenderError};
use crate::protocol::{Command, parse_line};

/// Transport state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Waiting for the source to (re)open.
    Disconnected,
    /// Reading lines from an open source.
    Listening,
    /// A terminal command was received; nothing more is read.
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Listening => "listening",
            ChannelState::Closed => "closed",
        })
    }
}

/// Something observable that a command did. Harmonic numbers are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Selected { harmonic: usize },
    AmplitudeSet { harmonic: usize, amplitude: f64 },
    ShapeSet { harmonic: usize, shape: WaveShape },
    OctaveSet { octave: i32 },
    NoteOn { key: String, pitch: String, frequency: f64 },
    NoteOff { key: String },
    Rendered { path: PathBuf, samples: usize },
    Closed,
}

/// What the caller should do after a line was handled.
#[derive(Debug)]
pub enum Dispatch {
    Applied(ControlEvent),
    Render(RenderJob),
    Ignored,
    Quit,
}

/// A render request bound to the bank as it was when the request arrived.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub snapshot: HarmonicBank,
    pub settings: RenderSettings,
    pub dir: PathBuf,
    pub name: String,
}

impl RenderJob {
    /// Render and write the file. CPU-bound and blocking.
    pub fn execute(self) -> Result<RenderReport, RenderError> {
        render_to_file(&self.snapshot, &self.settings, &self.dir, &self.name)
    }
}

pub struct ControlChannel {
    bank: HarmonicBank,
    /// 0-based index into `bank`.
    selected: usize,
    octave: i32,
    tones: ToneCalculator,
    settings: RenderSettings,
    output_dir: PathBuf,
    default_name: String,
    state: ChannelState,
}

impl ControlChannel {
    pub fn new(bank: HarmonicBank, config: &SynthConfig) -> Self {
        ControlChannel {
            bank,
            selected: 0,
            octave: config.octave,
            tones: config.tone_calculator(),
            settings: config.render_settings(),
            output_dir: config.output_dir.clone(),
            default_name: config.default_name.clone(),
            state: ChannelState::Disconnected,
        }
    }

    /// A channel over a fresh bank built from `config`.
    pub fn from_config(config: &SynthConfig) -> Result<Self, OvertoneError> {
        Ok(ControlChannel::new(config.bank()?, config))
    }

    pub fn bank(&self) -> &HarmonicBank {
        &self.bank
    }

    pub fn into_bank(self) -> HarmonicBank {
        self.bank
    }

    /// 0-based index of the selected harmonic.
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn transition(&mut self, to: ChannelState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "control channel state");
            self.state = to;
        }
    }

    /// Parse and apply one line.
    pub fn handle_line(&mut self, line: &str) -> Result<Dispatch, ControlError> {
        if self.state == ChannelState::Closed {
            return Ok(Dispatch::Quit);
        }
        let command = parse_line(line)?;
        self.apply(command)
    }

    pub fn apply(&mut self, command: Command) -> Result<Dispatch, ControlError> {
        let harmonic = self.selected + 1;
        let event = match command {
            Command::Select(n) => {
                let len = self.bank.len();
                if n < 1 || n as u64 > len as u64 {
                    return Err(ControlError::InvalidSelection { requested: n, len });
                }
                self.selected = (n - 1) as usize;
                info!(harmonic = n, "harmonic selected");
                ControlEvent::Selected { harmonic: n as usize }
            }
            Command::Amplitude(percent) => {
                let amplitude = self.bank.set_amplitude(self.selected, percent / 100.0)?;
                info!(harmonic, amplitude, "amplitude set");
                ControlEvent::AmplitudeSet { harmonic, amplitude }
            }
            Command::Shape(shape) => {
                let shape = self.bank.set_shape(self.selected, shape)?;
                info!(harmonic, %shape, "waveform set");
                ControlEvent::ShapeSet { harmonic, shape }
            }
            Command::Octave(octave) => {
                self.octave = octave;
                info!(octave, "octave set");
                ControlEvent::OctaveSet { octave }
            }
            Command::NoteOn(key) => {
                let (pitch, frequency) = self.tones.key_frequency(&key, self.octave)?;
                info!(%key, pitch, frequency, "note on");
                ControlEvent::NoteOn {
                    pitch: pitch.to_string(),
                    key,
                    frequency,
                }
            }
            Command::NoteOff(key) => {
                info!(%key, "note off");
                ControlEvent::NoteOff { key }
            }
            Command::Generate(name) => {
                let name = name.unwrap_or_else(|| self.default_name.clone());
                info!(%name, "render requested");
                return Ok(Dispatch::Render(self.render_job(name)));
            }
            Command::Quit => {
                self.transition(ChannelState::Closed);
                return Ok(Dispatch::Quit);
            }
            Command::Unknown(line) => {
                debug!(%line, "ignoring unrecognized line");
                return Ok(Dispatch::Ignored);
            }
        };
        Ok(Dispatch::Applied(event))
    }

    /// Snapshot the current bank into a render request.
    pub fn render_job(&self, name: String) -> RenderJob {
        RenderJob {
            snapshot: self.bank.clone(),
            settings: self.settings,
            dir: self.output_dir.clone(),
            name,
        }
    }
}

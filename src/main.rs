//! overtone: render harmonic banks to WAV, or drive one live from a pipe.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use overtone_core::config::SynthConfig;
use overtone_core::control::ControlChannel;
use overtone_core::dsp::bank::HarmonicBank;
use overtone_core::dsp::renderer::{HEADER_LEN, WavHeader, render_to_file};
use overtone_core::dsp::shape::WaveShape;
use overtone_core::error::{ConfigError, OvertoneError, RenderError};
use overtone_core::live::{FifoSource, ListenExit, Listener, ScriptSource};
use overtone_core::protocol::{check_script, format_diagnostic};

#[derive(Parser)]
#[command(name = "overtone", version, about = "Additive harmonic synthesizer")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a bank to a WAV file
    Render {
        /// Output file stem, written under the output directory
        name: Option<String>,
        /// Harmonic amplitude as NUMBER=VALUE (1-based, 0..1), repeatable
        #[arg(short, long = "amp", value_parser = parse_assignment)]
        amps: Vec<(usize, String)>,
        /// Harmonic waveform as NUMBER=NAME or NUMBER=MIX (0..100), repeatable
        #[arg(short, long = "shape", value_parser = parse_assignment)]
        shapes: Vec<(usize, String)>,
        /// Start from a JSON bank snapshot instead of a silent bank
        #[arg(long)]
        bank: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(short, long)]
        duration: Option<f64>,
        #[arg(long)]
        sample_rate: Option<u32>,
    },
    /// Listen for control lines on a named pipe
    Listen {
        /// Pipe path (defaults to the configured fifo_path)
        #[arg(short, long)]
        pipe: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a control script through the channel once
    Replay {
        script: PathBuf,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Write the final bank as JSON to this file
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Check a control script for malformed lines
    Check { script: PathBuf },
    /// Print the frequency of a note
    Tone {
        /// Pitch class, e.g. a, c#, f
        note: String,
        #[arg(default_value_t = 4, allow_hyphen_values = true)]
        octave: i32,
    },
    /// Print a WAV file's header and verify its sizes
    Inspect { file: PathBuf },
}

fn parse_assignment(s: &str) -> Result<(usize, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NUMBER=VALUE, got '{s}'"))?;
    let k: usize = k
        .trim()
        .parse()
        .map_err(|_| format!("invalid harmonic number '{k}'"))?;
    if k == 0 {
        return Err("harmonic numbers start at 1".into());
    }
    Ok((k, v.trim().to_string()))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, OvertoneError> {
    let mut config = SynthConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            name,
            amps,
            shapes,
            bank,
            output_dir,
            duration,
            sample_rate,
        } => {
            if let Some(d) = duration {
                config.duration_secs = d;
            }
            if let Some(sr) = sample_rate {
                config.sample_rate = sr;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            config.validate()?;

            let mut bank = match bank {
                Some(path) => load_bank(&path)?,
                None => config.bank()?,
            };
            for (k, value) in amps {
                let amplitude: f64 = value.parse().map_err(|_| {
                    ConfigError::Invalid(format!("amplitude for harmonic {k}: '{value}'"))
                })?;
                bank.set_amplitude(k - 1, amplitude)?;
            }
            for (k, value) in shapes {
                let shape: WaveShape = value.parse().map_err(ConfigError::Invalid)?;
                bank.set_shape(k - 1, shape)?;
            }

            let name = name.unwrap_or_else(|| config.default_name.clone());
            let settings = config.render_settings();
            let report = render_to_file(&bank, &settings, &config.output_dir, &name)?;
            println!("{} ({} samples, {} bytes)", report.path.display(), report.samples, report.bytes);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Listen { pipe, output_dir } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let mut source = FifoSource::new(pipe.unwrap_or_else(|| config.fifo_path.clone()));
            info!(pipe = %source.path().display(), harmonics = config.harmonics, "listening for control lines");
            let mut listener = Listener::new(ControlChannel::from_config(&config)?);
            let exit = listener.run(&mut source).await?;
            info!(?exit, "listener stopped");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Replay {
            script,
            output_dir,
            dump,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let mut source = ScriptSource::from_file(&script).map_err(|source| ConfigError::Read {
                path: script.clone(),
                source,
            })?;
            let mut listener = Listener::new(ControlChannel::from_config(&config)?);
            let exit = listener.run(&mut source).await?;
            if exit == ListenExit::Exhausted {
                info!("script ended without an exit command");
            }
            if let Some(path) = dump {
                let json = listener.into_channel().into_bank().to_json();
                fs::write(&path, json).map_err(|source| RenderError::Io { path, source })?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { script } => {
            let text = fs::read_to_string(&script).map_err(|source| ConfigError::Read {
                path: script.clone(),
                source,
            })?;
            let name = script.display().to_string();
            let diagnostics = check_script(&text);
            for d in &diagnostics {
                eprint!("{}", format_diagnostic(&name, &text, d));
            }
            if diagnostics.is_empty() {
                println!("{name}: ok");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{name}: {} malformed line(s)", diagnostics.len());
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Tone { note, octave } => {
            let frequency = config.tone_calculator().frequency(&note, octave)?;
            println!("{note}{octave}: {frequency:.2} Hz");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect { file } => {
            let bytes = fs::read(&file).map_err(|source| RenderError::Io {
                path: file.clone(),
                source,
            })?;
            let header = WavHeader::parse(&bytes)?;
            println!("{}", file.display());
            println!("  format        {}", header.format);
            println!("  channels      {}", header.channels);
            println!("  sample rate   {} Hz", header.sample_rate);
            println!("  bits          {}", header.bits_per_sample);
            println!("  byte rate     {}", header.byte_rate);
            println!("  block align   {}", header.block_align);
            println!("  data size     {} bytes", header.data_size);
            println!("  riff size     {} bytes", header.riff_size);
            let actual = bytes.len() - HEADER_LEN;
            let ok = header.is_consistent() && actual == header.data_size as usize;
            println!("  sizes         {}", if ok { "consistent" } else { "MISMATCH" });
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn load_bank(path: &Path) -> Result<HarmonicBank, OvertoneError> {
    let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(HarmonicBank::from_json(&json)?)
}

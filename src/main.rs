use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use termcast::config::RenderConfig;
use termcast::encoding::VideoEncoder;
use termcast::exec::{CommandExecutor, ShellExecutor};
use termcast::font::FontFace;
use termcast::frames::DiskFrameStore;
use termcast::render::FrameRenderer;
use termcast::script::{load_script, ScriptEntry};
use termcast::session::{ScriptedStep, SessionDriver};

#[derive(Debug, Parser)]
#[command(name = "termcast")]
#[command(about = "Compile a scripted terminal session into a typed-out video")]
struct Cli {
    /// Script file: one command or #comment per line
    script: PathBuf,

    /// Output video file
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Typing speed dial, 0 (slowest) to 10 (fastest)
    #[arg(short = 's', long = "speed")]
    speed: Option<f32>,

    /// Frame rate of the output video
    #[arg(short = 'f', long = "framerate")]
    frame_rate: Option<u32>,

    /// Seconds to hold before showing command output
    #[arg(short = 'd', long = "output-delay")]
    output_delay: Option<f32>,

    /// YAML theme file overriding the built-in look
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Scratch directory for intermediate frames
    #[arg(long = "frames-dir", default_value = "frames")]
    frames_dir: PathBuf,

    /// Write a JSON render-stats sidecar next to the output
    #[arg(long)]
    sidecar: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output = output;
    }
    if let Some(speed) = cli.speed {
        config.typing_speed = speed;
    }
    if let Some(frame_rate) = cli.frame_rate {
        config.frame_rate = frame_rate;
    }
    if let Some(delay) = cli.output_delay {
        config.output_delay = delay;
    }
    config.validate()?;

    let entries = load_script(&cli.script)?;
    if entries.is_empty() {
        bail!("script {} contains no entries", cli.script.display());
    }

    let face = match &config.font_path {
        Some(path) => FontFace::from_path(path)?,
        None => FontFace::resolve(&config.font_families)?,
    };
    eprintln!("using font {}", face.source().display());

    let steps = collect_outputs(&entries)?;

    let mut store = DiskFrameStore::create(&cli.frames_dir)?;
    let renderer = FrameRenderer::new(config.clone(), face)?;
    let driver = SessionDriver::new(renderer, &mut store);
    let stats = driver.run(&steps)?;
    eprintln!(
        "rendered {} frames ({:.1}s at {} fps)",
        stats.frames, stats.duration_seconds, stats.frame_rate
    );

    eprintln!("compiling frames into {}", config.output.display());
    let encoder = VideoEncoder::new(config.frame_rate);
    if let Err(error) = encoder.encode(&store.pattern(), &config.output) {
        return Err(error.context(format!(
            "encoding failed; frames retained in {} for manual recovery",
            store.dir().display()
        )));
    }

    if cli.sidecar {
        let sidecar_path = config.output.with_extension("json");
        let json = serde_json::to_string_pretty(&stats)?;
        fs::write(&sidecar_path, json)
            .with_context(|| format!("failed to write sidecar {}", sidecar_path.display()))?;
        eprintln!("wrote sidecar {}", sidecar_path.display());
    }

    store.remove()?;
    println!("Wrote {}", config.output.display());
    Ok(())
}

/// Runs every command in one persistent shell before any frame work, so
/// the driver renders against pre-collected output.
fn collect_outputs(entries: &[ScriptEntry]) -> Result<Vec<ScriptedStep>> {
    let mut shell = ShellExecutor::spawn()?;
    entries
        .iter()
        .map(|entry| {
            let output = match entry {
                ScriptEntry::Comment(_) => String::new(),
                ScriptEntry::Command(command) => {
                    eprintln!("executing: {command}");
                    shell.run(command)?
                }
            };
            Ok(ScriptedStep::new(entry.clone(), output))
        })
        .collect()
}

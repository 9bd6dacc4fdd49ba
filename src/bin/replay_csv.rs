use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use mano_serial::classifier::{GestureLabels, OnnxClassifier};
use mano_serial::config::Config;
use mano_serial::frame_csv::load_frames_from_csv;
use mano_serial::pipeline::{GesturePipeline, LineSink};
use mano_serial::source::ReplaySource;
use mano_serial::types::DIMENSION;
use mano_serial::window_buffer::SlidingWindowBuffer;

const USAGE: &str =
    "Uso: replay_csv [--config <config.yaml>] [--dump-window] <frames.csv>";

struct ReplayOptions {
    config: Option<PathBuf>,
    dump_window: bool,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut config = None;
    let mut dump_window = false;
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-window" => dump_window = true,
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                config = Some(PathBuf::from(path));
            }
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV"))?;
    Ok((csv_path, ReplayOptions { config, dump_window }))
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let (csv_path, opts) = parse_args()?;
    let config = match &opts.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("No se pudo cargar {}", path.display()))?,
        None => Config::default(),
    };
    config.validate()?;

    eprintln!("🎞️  Reproduciendo frames desde {:?}", csv_path);
    let frames = load_frames_from_csv(&csv_path)?;
    eprintln!("ℹ️  {} frames cargados", frames.len());

    let labels = match &config.model.labels {
        Some(path) => GestureLabels::load(path)?,
        None => GestureLabels::default(),
    };

    let window = SlidingWindowBuffer::new(config.window.time_steps, DIMENSION);
    let classifier = OnnxClassifier::new(
        &config.model.path,
        window.capacity(),
        &config.classifier,
        Some(&labels).filter(|l| !l.is_empty()),
    )?;

    let mut pipeline = GesturePipeline::new(window, classifier)
        .with_labels(labels)
        .with_suppress_repeats(config.output.suppress_repeats);

    let mut source = ReplaySource::new(frames);
    let mut sink = LineSink::new(io::stdout(), config.output.ready_marker.clone());
    let stats = pipeline.run(&mut source, &mut sink)?;

    eprintln!(
        "\n🥇 {} gestos en {} ventanas ({} sin gesto, {} frames descartados)",
        stats.gestures_emitted, stats.windows_classified, stats.sentinel_windows, stats.frames_rejected
    );

    if opts.dump_window {
        let window = pipeline.window();
        if !window.is_full() {
            bail!("No se llegó a llenar ninguna ventana");
        }
        eprintln!("\n🧱 Última ventana ({} frames):", window.frames());
        eprint!("{}", window.to_csv());
    }

    Ok(())
}

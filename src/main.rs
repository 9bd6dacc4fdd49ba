/*
Reconocimiento de gestos de mano en tiempo real - Rust + ONNX

1. Lee tramas de keypoints `[x0,y0,...,x20,y20]` del detector por puerto serie
2. Normaliza cada frame y acumula una ventana deslizante de 23 frames
3. Clasifica la ventana con ONNX Runtime
4. Escribe "#" cuando el puerto está listo y después un id de gesto por línea

Ejemplos:
     ./target/release/mano-serial --port /dev/ttyUSB0 --model hand_classifier_v2.onnx
     ./target/release/mano-serial --input captura.txt --record frames.csv
     ./target/release/mano-serial --print-config > mano-serial.yaml
*/

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use mano_serial::classifier::{GestureLabels, OnnxClassifier};
use mano_serial::config::{Config, EXAMPLE_CONFIG};
use mano_serial::frame_csv::FrameRecorder;
use mano_serial::pipeline::{GesturePipeline, LineSink};
use mano_serial::source::{
    spawn_reader, ChannelFrameSource, FrameSource, RecordingSource, StreamFrameSource,
    READER_CHANNEL_CAPACITY,
};
use mano_serial::transport::{open_serial, RetryPolicy};
use mano_serial::types::DIMENSION;
use mano_serial::window_buffer::SlidingWindowBuffer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fichero de configuración (YAML)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Puerto serie del detector
    #[arg(short, long)]
    port: Option<String>,

    /// Baudios del puerto serie
    #[arg(short, long)]
    baud: Option<u32>,

    /// Leer tramas de un fichero ("-" para stdin) en lugar del puerto serie
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Modelo ONNX del clasificador
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// JSON con nombres de clases (index_to_class)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Confianza mínima del clasificador
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Intentos máximos al abrir el puerto (por defecto, infinitos)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// No repetir un gesto igual al último emitido
    #[arg(long)]
    suppress_repeats: bool,

    /// Grabar los frames recibidos en un CSV
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Mostrar una configuración de ejemplo y salir
    #[arg(long)]
    print_config: bool,

    /// Activar salida de debug
    #[arg(short, long)]
    debug: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Cargando configuración de {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("No se pudo cargar {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(model) = &args.model {
        config.model.path = model.clone();
    }
    if let Some(labels) = &args.labels {
        config.model.labels = Some(labels.clone());
    }
    if let Some(threshold) = args.threshold {
        config.classifier.score_threshold = threshold;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.retry.max_attempts = Some(max_attempts);
    }
    if args.suppress_repeats {
        config.output.suppress_repeats = true;
    }

    config.validate()?;
    Ok(config)
}

/// Arranca el hilo lector, grabando los frames si se pidió
fn start_reader<S>(source: S, record: Option<&Path>) -> Result<ChannelFrameSource>
where
    S: FrameSource + Send + 'static,
{
    match record {
        Some(path) => {
            let recorder = FrameRecorder::create(path)?;
            info!("🎞️  Grabando frames en {}", path.display());
            Ok(spawn_reader(
                RecordingSource::new(source, recorder),
                READER_CHANNEL_CAPACITY,
            ))
        }
        None => Ok(spawn_reader(source, READER_CHANNEL_CAPACITY)),
    }
}

fn open_source(args: &Args, config: &Config) -> Result<ChannelFrameSource> {
    let record = args.record.as_deref();

    match &args.input {
        Some(path) if path.as_os_str() == "-" => {
            info!("🔧 Modo: stdin");
            start_reader(StreamFrameSource::new(io::stdin()), record)
        }
        Some(path) => {
            info!("🔧 Modo: fichero {}", path.display());
            let file = File::open(path)
                .with_context(|| format!("No se pudo abrir {}", path.display()))?;
            start_reader(StreamFrameSource::new(file), record)
        }
        None => {
            info!("🔧 Modo: puerto serie {}", config.serial.port);
            let policy = RetryPolicy::from(&config.retry);
            let port = open_serial(&config.serial, &policy)?;
            start_reader(StreamFrameSource::new(port), record)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    info!("🎯 Hand Gesture Recognition - Rust + ONNX");
    let config = load_config(&args)?;

    let labels = match &config.model.labels {
        Some(path) => GestureLabels::load(path)
            .with_context(|| format!("No se pudieron cargar las clases de {}", path.display()))?,
        None => GestureLabels::default(),
    };

    info!("🔧 Inicializando clasificador ONNX...");
    let window = SlidingWindowBuffer::new(config.window.time_steps, DIMENSION);
    let classifier = OnnxClassifier::new(
        &config.model.path,
        window.capacity(),
        &config.classifier,
        Some(&labels).filter(|l| !l.is_empty()),
    )
    .with_context(|| format!("No se pudo cargar el modelo {}", config.model.path.display()))?;
    info!("✅ Clasificador cargado");

    let mut pipeline = GesturePipeline::new(window, classifier)
        .with_labels(labels)
        .with_suppress_repeats(config.output.suppress_repeats);

    let mut source = open_source(&args, &config)?;
    let mut sink = LineSink::new(io::stdout(), config.output.ready_marker.clone());

    info!("🎬 Iniciando reconocimiento en tiempo real...");
    pipeline.run(&mut source, &mut sink)?;

    info!("👋 Fin del stream de entrada");
    Ok(())
}

//! Bucle principal: frame → normalización → ventana → clasificador → salida
//!
//! Los errores de un frame (trama mal formada, escala degenerada, fallo del
//! clasificador) se registran y se cuentan, y el bucle continúa. Sólo un
//! fallo del transporte o de la salida termina la ejecución.

use crate::classifier::{ClassifierError, GestureClassifier, GestureLabels};
use crate::normalizer::{normalize, NormalizeError};
use crate::source::{FrameSource, SourceError};
use crate::window_buffer::{SlidingWindowBuffer, WindowError};
use log::{debug, info, warn};
use std::io::{self, Write};
use thiserror::Error;

/// Cada cuántos frames se vuelcan las estadísticas en debug
const STATS_EVERY: u64 = 1000;

/// Toca volcar estadísticas tras `received` frames, bien formados o no
fn stats_due(received: u64) -> bool {
    received > 0 && received % STATS_EVERY == 0
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Frame source failed: {0}")]
    Source(SourceError),

    #[error("Result sink failed: {0}")]
    Sink(#[from] io::Error),
}

/// Destino de los ids de gesto
pub trait ResultSink {
    /// Se llama una vez, cuando la fuente ya está abierta
    fn ready(&mut self) -> io::Result<()>;

    fn emit(&mut self, gesture_id: i32) -> io::Result<()>;
}

/// Escribe el marcador de listo y luego un id por línea, con flush inmediato
pub struct LineSink<W> {
    out: W,
    ready_marker: String,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W, ready_marker: impl Into<String>) -> Self {
        Self {
            out,
            ready_marker: ready_marker.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for LineSink<W> {
    fn ready(&mut self) -> io::Result<()> {
        if !self.ready_marker.is_empty() {
            writeln!(self.out, "{}", self.ready_marker)?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn emit(&mut self, gesture_id: i32) -> io::Result<()> {
        writeln!(self.out, "{}", gesture_id)?;
        self.out.flush()
    }
}

/// Colecciona los ids en memoria
impl ResultSink for Vec<i32> {
    fn ready(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn emit(&mut self, gesture_id: i32) -> io::Result<()> {
        self.push(gesture_id);
        Ok(())
    }
}

/// Estadísticas de la ejecución
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_received: u64,
    pub frames_rejected: u64,
    pub windows_classified: u64,
    pub gestures_emitted: u64,
    pub repeats_suppressed: u64,
    pub sentinel_windows: u64,
    pub classifier_errors: u64,
}

/// Resultado de procesar un frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// La ventana aún no está llena
    Filling { frames: usize },
    /// El clasificador devolvió la etiqueta centinela
    NoGesture,
    /// Gesto a emitir
    Gesture(i32),
    /// Igual al último gesto emitido (con supresión de repeticiones)
    Repeated(i32),
}

pub struct GesturePipeline<C> {
    window: SlidingWindowBuffer,
    classifier: C,
    labels: GestureLabels,
    suppress_repeats: bool,
    last_emitted: Option<i32>,
    stats: PipelineStats,
}

impl<C: GestureClassifier> GesturePipeline<C> {
    pub fn new(window: SlidingWindowBuffer, classifier: C) -> Self {
        Self {
            window,
            classifier,
            labels: GestureLabels::default(),
            suppress_repeats: false,
            last_emitted: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn with_labels(mut self, labels: GestureLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_suppress_repeats(mut self, suppress: bool) -> Self {
        self.suppress_repeats = suppress;
        self
    }

    /// Procesa un frame crudo. Un error aquí descarta sólo este frame o
    /// esta ventana; la ventana acumulada no se modifica con datos inválidos.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<FrameOutcome, PipelineError> {
        let normalized = normalize(frame)?;

        let full = match self.window.push(normalized.as_slice())? {
            Some(full) => full,
            None => {
                return Ok(FrameOutcome::Filling {
                    frames: self.window.frames(),
                })
            }
        };

        let gesture_id = self.classifier.classify(&full)?;

        if gesture_id == self.classifier.sentinel() {
            self.last_emitted = None;
            return Ok(FrameOutcome::NoGesture);
        }

        if self.suppress_repeats && self.last_emitted == Some(gesture_id) {
            return Ok(FrameOutcome::Repeated(gesture_id));
        }

        self.last_emitted = Some(gesture_id);
        Ok(FrameOutcome::Gesture(gesture_id))
    }

    /// Consume la fuente hasta el fin de stream, emitiendo los gestos en orden
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<PipelineStats, RunError>
    where
        S: FrameSource + ?Sized,
        K: ResultSink + ?Sized,
    {
        sink.ready()?;

        loop {
            let next = match source.next_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(e) if e.is_recoverable() => Err(e),
                Err(e) => return Err(RunError::Source(e)),
            };

            self.stats.frames_received += 1;
            match next {
                Ok(frame) => self.handle_frame(&frame, sink)?,
                Err(e) => {
                    self.stats.frames_rejected += 1;
                    warn!("⚠️  Frame descartado: {}", e);
                }
            }

            if stats_due(self.stats.frames_received) {
                debug!("[STATS] {:?}", self.stats);
            }
        }

        info!(
            "📊 Frames={} descartados={} ventanas={} gestos={}",
            self.stats.frames_received,
            self.stats.frames_rejected,
            self.stats.windows_classified,
            self.stats.gestures_emitted
        );
        Ok(self.stats)
    }

    /// Procesa un frame ya recibido y emite el gesto si lo hay
    fn handle_frame<K>(&mut self, frame: &[f32], sink: &mut K) -> io::Result<()>
    where
        K: ResultSink + ?Sized,
    {
        match self.process_frame(frame) {
            Ok(FrameOutcome::Filling { frames }) => {
                debug!("Ventana {}/{}", frames, self.window.time_steps());
            }
            Ok(FrameOutcome::NoGesture) => {
                self.stats.windows_classified += 1;
                self.stats.sentinel_windows += 1;
            }
            Ok(FrameOutcome::Repeated(id)) => {
                self.stats.windows_classified += 1;
                self.stats.repeats_suppressed += 1;
                debug!("Gesto repetido suprimido: {}", self.labels.describe(id));
            }
            Ok(FrameOutcome::Gesture(id)) => {
                self.stats.windows_classified += 1;
                self.stats.gestures_emitted += 1;
                info!("[GESTO] {}", self.labels.describe(id));
                sink.emit(id)?;
            }
            Err(PipelineError::Classifier(e)) => {
                self.stats.classifier_errors += 1;
                warn!("❌ Error clasificando: {}", e);
            }
            Err(e) => {
                self.stats.frames_rejected += 1;
                warn!("⚠️  Frame descartado: {}", e);
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn window(&self) -> &SlidingWindowBuffer {
        &self.window
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }
}

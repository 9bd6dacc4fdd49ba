use crate::types::{DIMENSION, TIME_STEPS};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Invalid frame size: expected {expected}, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },
}

/// Ventana deslizante de los últimos `time_steps` frames normalizados,
/// guardada ya aplanada en el formato que espera el clasificador:
/// [frame0.v0 .. frame0.v41, frame1.v0 .. frameN.v41], más antiguo primero.
///
/// Cada push añade un frame al final y, si se pasa de capacidad, descarta
/// exactamente un frame del principio. No hay reset: una vez llena, la
/// ventana sigue deslizando aunque la entrada se quede en silencio.
#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer {
    buffer: Vec<f32>,
    time_steps: usize,
    dimension: usize,
    capacity: usize,
}

impl SlidingWindowBuffer {
    /// Crea una ventana de `time_steps` frames de `dimension` valores
    pub fn new(time_steps: usize, dimension: usize) -> Self {
        assert!(time_steps > 0, "time_steps must be positive");
        assert!(dimension > 0, "dimension must be positive");

        let capacity = time_steps * dimension;
        Self {
            // +dimension: el frame entrante cabe antes de recortar
            buffer: Vec::with_capacity(capacity + dimension),
            time_steps,
            dimension,
            capacity,
        }
    }

    /// Añade un frame. Devuelve una copia de la ventana completa cuando hay
    /// `time_steps` frames acumulados, `None` mientras se está llenando.
    pub fn push(&mut self, frame: &[f32]) -> Result<Option<Vec<f32>>, WindowError> {
        if frame.len() != self.dimension {
            return Err(WindowError::FrameSizeMismatch {
                expected: self.dimension,
                actual: frame.len(),
            });
        }

        self.buffer.extend_from_slice(frame);

        if self.buffer.len() > self.capacity {
            debug_assert_eq!(
                self.buffer.len() - self.capacity,
                self.dimension,
                "window overflow must be exactly one frame"
            );
            self.buffer.drain(..self.dimension);
        }

        if self.is_full() {
            Ok(Some(self.buffer.clone()))
        } else {
            Ok(None)
        }
    }

    /// Verifica si la ventana tiene los `time_steps` frames
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Número de valores acumulados
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Número de frames acumulados
    pub fn frames(&self) -> usize {
        self.buffer.len() / self.dimension
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    /// Vista plana del contenido actual (más antiguo primero)
    pub fn as_slice(&self) -> &[f32] {
        &self.buffer
    }

    /// Exporta la ventana actual a CSV, un frame por fila: frame,v0,...,vN
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("frame");
        for i in 0..self.dimension {
            csv.push_str(&format!(",v{}", i));
        }
        csv.push('\n');

        for (frame_idx, frame) in self.buffer.chunks_exact(self.dimension).enumerate() {
            csv.push_str(&frame_idx.to_string());
            for value in frame {
                csv.push_str(&format!(",{}", value));
            }
            csv.push('\n');
        }

        csv
    }
}

impl Default for SlidingWindowBuffer {
    fn default() -> Self {
        Self::new(TIME_STEPS, DIMENSION)
    }
}

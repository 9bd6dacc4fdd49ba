use crate::types::{Frame, DIMENSION};
use thiserror::Error;

/// Longitud máxima de un frame en bytes antes de descartarlo.
/// 42 floats en ASCII caben de sobra.
pub const MAX_FRAME_BYTES: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Invalid value count: expected {expected}, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("Invalid number {text:?} at position {index}")]
    InvalidNumber { index: usize, text: String },

    #[error("Frame exceeds {limit} bytes without closing ']'")]
    Overlong { limit: usize },

    #[error("Frame must be enclosed in '[' ... ']'")]
    MissingBrackets,
}

/// Estado del decodificador de tramas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Descartando bytes hasta encontrar '['
    Seeking,
    /// Acumulando el contenido de la trama
    InFrame,
}

/// Decodificador incremental de tramas ASCII `[v0,v1,...,v41]`.
///
/// Se alimenta byte a byte y no depende del transporte, así que se puede
/// probar sin puerto serie. Los bytes no ASCII se ignoran, igual que un '['
/// repetido dentro de una trama.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: State,
    buf: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Seeking,
            buf: String::with_capacity(512),
        }
    }

    /// Alimenta un byte. Devuelve `Some` cuando se cierra una trama.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Frame, FrameError>> {
        match self.state {
            State::Seeking => {
                if byte == b'[' {
                    self.buf.clear();
                    self.state = State::InFrame;
                }
                None
            }
            State::InFrame => match byte {
                b']' => {
                    self.state = State::Seeking;
                    Some(parse_values(&self.buf))
                }
                b'[' => None,
                b if !b.is_ascii() => None,
                b => {
                    if self.buf.len() >= MAX_FRAME_BYTES {
                        // Resincronizar en el siguiente '['
                        self.state = State::Seeking;
                        self.buf.clear();
                        return Some(Err(FrameError::Overlong {
                            limit: MAX_FRAME_BYTES,
                        }));
                    }
                    self.buf.push(b as char);
                    None
                }
            },
        }
    }

    /// Indica si hay una trama a medio recibir
    pub fn in_frame(&self) -> bool {
        self.state == State::InFrame
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsea una trama completa con corchetes, p.ej. "[1.0, 2.5, ...]"
pub fn parse_frame(text: &str) -> Result<Frame, FrameError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or(FrameError::MissingBrackets)?;
    parse_values(inner)
}

/// Parsea la lista separada por comas de dentro de la trama
fn parse_values(body: &str) -> Result<Frame, FrameError> {
    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() != DIMENSION {
        return Err(FrameError::WrongCount {
            expected: DIMENSION,
            actual: fields.len(),
        });
    }

    let mut frame: Frame = [0.0; DIMENSION];
    for (index, (slot, field)) in frame.iter_mut().zip(&fields).enumerate() {
        let text = field.trim();
        *slot = text.parse::<f32>().map_err(|_| FrameError::InvalidNumber {
            index,
            text: text.to_string(),
        })?;
    }

    Ok(frame)
}

/// Serializa un frame en el formato de la trama (útil para simular el detector)
pub fn format_frame(frame: &[f32]) -> String {
    let values: Vec<String> = frame.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

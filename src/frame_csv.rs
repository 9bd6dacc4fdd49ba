use std::fs::File;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, Writer};

use crate::types::{Frame, DIMENSION, NUM_KEYPOINTS};

/// Cabecera de las grabaciones: x0,y0,x1,y1,...,x20,y20
pub fn csv_header() -> Vec<String> {
    (0..NUM_KEYPOINTS)
        .flat_map(|k| [format!("x{}", k), format!("y{}", k)])
        .collect()
}

/// Carga una secuencia de frames crudos desde un CSV con una fila por frame
/// y 42 columnas en el orden de la trama.
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() != DIMENSION {
            bail!(
                "La fila {} tiene {} columnas (se esperaban {})",
                row_idx + 1,
                record.len(),
                DIMENSION
            );
        }

        let mut frame: Frame = [0.0; DIMENSION];
        for (col, (slot, field)) in frame.iter_mut().zip(record.iter()).enumerate() {
            *slot = field
                .parse()
                .with_context(|| format!("Valor {:?} inválido en fila {}, columna {}", field, row_idx + 1, col))?;
        }
        frames.push(frame);
    }

    ensure!(!frames.is_empty(), "El CSV {:?} no contiene frames", path);
    Ok(frames)
}

/// Grabador de frames crudos en el mismo formato que lee `load_frames_from_csv`
pub struct FrameRecorder {
    writer: Writer<File>,
    rows: u64,
}

impl FrameRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut writer = Writer::from_path(path)
            .with_context(|| format!("No se pudo crear la grabación {:?}", path))?;
        writer.write_record(csv_header())?;
        Ok(Self { writer, rows: 0 })
    }

    /// Escribe un frame y vacía el buffer; si el proceso muere con Ctrl-C
    /// las filas ya grabadas siguen en disco
    pub fn record(&mut self, frame: &Frame) -> Result<()> {
        self.writer
            .write_record(frame.iter().map(|v| v.to_string()))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Frames grabados hasta ahora
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

use crate::frame_csv::FrameRecorder;
use crate::frame_parser::{FrameDecoder, FrameError};
use crate::types::Frame;
use crossbeam_channel::{bounded, Receiver};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use thiserror::Error;

/// Capacidad del canal entre el hilo lector y el pipeline
pub const READER_CHANNEL_CAPACITY: usize = 100;

#[derive(Error, Debug)]
pub enum SourceError {
    /// Trama mal formada: se descarta y se sigue leyendo
    #[error("Malformed frame: {0}")]
    Malformed(#[from] FrameError),

    /// Fallo del transporte: termina la lectura
    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Malformed(_))
    }
}

/// Origen de frames. `Ok(None)` indica fin de stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Lee tramas `[...]` de cualquier `Read` (puerto serie, stdin, fichero).
/// Los timeouts de lectura no son fin de stream: se sigue esperando.
pub struct StreamFrameSource<R> {
    reader: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl<R: Read> StreamFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            chunk: vec![0; 256],
            pos: 0,
            filled: 0,
        }
    }
}

impl<R: Read> FrameSource for StreamFrameSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            while self.pos < self.filled {
                let byte = self.chunk[self.pos];
                self.pos += 1;
                if let Some(result) = self.decoder.feed(byte) {
                    return result.map(Some).map_err(SourceError::from);
                }
            }

            match self.reader.read(&mut self.chunk) {
                Ok(0) => {
                    if self.decoder.in_frame() {
                        warn!("⚠️  Fin de stream con una trama incompleta");
                    }
                    return Ok(None);
                }
                Ok(n) => {
                    self.filled = n;
                    self.pos = 0;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    debug!("⏳ Timeout de lectura, esperando datos...");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Extremo receptor del hilo lector
pub struct ChannelFrameSource {
    rx: Receiver<Result<Frame, SourceError>>,
}

impl FrameSource for ChannelFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self.rx.recv() {
            Ok(item) => item.map(Some),
            // El hilo lector terminó
            Err(_) => Ok(None),
        }
    }
}

/// Lanza un hilo que hace las lecturas bloqueantes y envía los frames por
/// un canal acotado. El pipeline sigue consumiéndolos uno a uno y en orden.
pub fn spawn_reader<S>(mut source: S, capacity: usize) -> ChannelFrameSource
where
    S: FrameSource + Send + 'static,
{
    let (tx, rx) = bounded(capacity);

    std::thread::spawn(move || loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let fatal = !e.is_recoverable();
                if fatal {
                    error!("❌ Error en el lector: {}", e);
                }
                if tx.send(Err(e)).is_err() || fatal {
                    break;
                }
            }
        }
    });

    ChannelFrameSource { rx }
}

/// Frames ya cargados en memoria (replay de CSV, pruebas)
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<Frame>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.frames.pop_front())
    }
}

/// Graba en CSV cada frame bien formado que pasa por la fuente interna
pub struct RecordingSource<S> {
    inner: S,
    recorder: FrameRecorder,
}

impl<S: FrameSource> RecordingSource<S> {
    pub fn new(inner: S, recorder: FrameRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl<S: FrameSource> FrameSource for RecordingSource<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let next = self.inner.next_frame()?;
        match &next {
            Some(frame) => {
                if let Err(e) = self.recorder.record(frame) {
                    warn!("⚠️  No se pudo grabar el frame: {}", e);
                }
            }
            None => {
                if let Err(e) = self.recorder.flush() {
                    warn!("⚠️  No se pudo vaciar la grabación: {}", e);
                }
                info!("🎞️  {} frames grabados", self.recorder.rows());
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_parser::format_frame;
    use crate::types::DIMENSION;
    use std::io::{self, Cursor};

    fn frame_of(value: f32) -> Frame {
        [value; DIMENSION]
    }

    fn stream_of(text: &str) -> StreamFrameSource<Cursor<Vec<u8>>> {
        StreamFrameSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    /// Lector que falla con timeout en la primera lectura
    struct TimeoutThenData {
        timed_out: bool,
        data: Cursor<Vec<u8>>,
    }

    impl Read for TimeoutThenData {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.timed_out {
                self.timed_out = true;
                return Err(io::Error::new(ErrorKind::TimedOut, "timeout"));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_stream_source_reads_frames_until_eof() {
        let text = format!("{}\r\n{}\r\n", format_frame(&frame_of(1.0)), format_frame(&frame_of(2.0)));
        let mut source = stream_of(&text);

        assert_eq!(source.next_frame().unwrap(), Some(frame_of(1.0)));
        assert_eq!(source.next_frame().unwrap(), Some(frame_of(2.0)));
        assert_eq!(source.next_frame().unwrap(), None);
    }

    #[test]
    fn test_stream_source_reports_malformed_and_continues() {
        let text = format!("[1,2,3]{}", format_frame(&frame_of(5.0)));
        let mut source = stream_of(&text);

        let err = source.next_frame().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(source.next_frame().unwrap(), Some(frame_of(5.0)));
    }

    #[test]
    fn test_stream_source_waits_through_timeouts() {
        let reader = TimeoutThenData {
            timed_out: false,
            data: Cursor::new(format_frame(&frame_of(3.0)).into_bytes()),
        };
        let mut source = StreamFrameSource::new(reader);
        assert_eq!(source.next_frame().unwrap(), Some(frame_of(3.0)));
    }

    #[test]
    fn test_reader_thread_preserves_order() {
        let frames: Vec<Frame> = (0..250).map(|i| frame_of(i as f32)).collect();
        let mut source = spawn_reader(ReplaySource::new(frames.clone()), READER_CHANNEL_CAPACITY);

        let mut received = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            received.push(frame);
        }
        assert_eq!(received, frames);
    }

    #[test]
    fn test_reader_thread_forwards_malformed_frames() {
        let text = format!("[oops]{}", format_frame(&frame_of(9.0)));
        let mut source = spawn_reader(stream_of(&text), 4);

        assert!(matches!(source.next_frame(), Err(SourceError::Malformed(_))));
        assert_eq!(source.next_frame().unwrap(), Some(frame_of(9.0)));
        assert_eq!(source.next_frame().unwrap(), None);
    }

    /// Lector que entrega una trama y después pierde la conexión
    struct DisconnectingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for DisconnectingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(ErrorKind::BrokenPipe, "device unplugged")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_stream_source_io_error_is_fatal() {
        let mut source = StreamFrameSource::new(DisconnectingReader {
            data: Cursor::new(format_frame(&frame_of(4.0)).into_bytes()),
        });

        assert_eq!(source.next_frame().unwrap(), Some(frame_of(4.0)));
        let err = source.next_frame().unwrap_err();
        assert!(!err.is_recoverable());
        assert!(matches!(err, SourceError::Io(ref e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_reader_thread_stops_after_io_error() {
        let reader = DisconnectingReader {
            data: Cursor::new(format_frame(&frame_of(6.0)).into_bytes()),
        };
        let mut source = spawn_reader(StreamFrameSource::new(reader), 4);

        assert_eq!(source.next_frame().unwrap(), Some(frame_of(6.0)));
        assert!(matches!(source.next_frame(), Err(SourceError::Io(_))));
        // El hilo terminó y el canal quedó desconectado
        assert_eq!(source.next_frame().unwrap(), None);
    }

    #[test]
    fn test_recording_visible_while_stream_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");

        let recorder = FrameRecorder::create(&path).unwrap();
        let frames = vec![frame_of(1.0), frame_of(2.0), frame_of(3.0)];
        let mut source = RecordingSource::new(ReplaySource::new(frames), recorder);
        source.next_frame().unwrap();
        source.next_frame().unwrap();

        // Sin llegar al fin de stream ni soltar la fuente
        let loaded = crate::frame_csv::load_frames_from_csv(&path).unwrap();
        assert_eq!(loaded, vec![frame_of(1.0), frame_of(2.0)]);
        drop(source);
    }

    #[test]
    fn test_recording_source_writes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.csv");

        let recorder = FrameRecorder::create(&path).unwrap();
        let mut source = RecordingSource::new(ReplaySource::new(vec![frame_of(1.0), frame_of(2.0)]), recorder);
        while source.next_frame().unwrap().is_some() {}
        drop(source);

        let loaded = crate::frame_csv::load_frames_from_csv(&path).unwrap();
        assert_eq!(loaded, vec![frame_of(1.0), frame_of(2.0)]);
    }
}

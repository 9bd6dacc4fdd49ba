//! Reconocimiento de gestos de mano a partir de keypoints recibidos por puerto serie.
//!
//! Cada trama `[x0,y0,...,x20,y20]` se normaliza (muñeca al origen, escala
//! muñeca→meñique), se acumula en una ventana deslizante de 23 frames y, con
//! la ventana llena, se clasifica con un modelo ONNX. Los ids distintos de la
//! etiqueta centinela se escriben uno por línea en la salida.

pub mod classifier;
pub mod config;
pub mod frame_csv;
pub mod frame_parser;
pub mod normalizer;
pub mod pipeline;
pub mod source;
pub mod transport;
pub mod types;
pub mod window_buffer;

pub use classifier::{GestureClassifier, GestureLabels, OnnxClassifier};
pub use config::Config;
pub use normalizer::normalize;
pub use pipeline::{GesturePipeline, LineSink, ResultSink};
pub use source::FrameSource;
pub use window_buffer::SlidingWindowBuffer;

use crate::config::ClassifierConfig;
use log::info;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid window size: expected {expected}, got {actual}")]
    InvalidWindowSize { expected: usize, actual: usize },

    #[error("Model returned no scores")]
    NoScores,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("Sentinel label {sentinel} collides with one of the {classes} class indices")]
    SentinelCollision { sentinel: i32, classes: usize },
}

/// Clasificador de ventanas: recibe la ventana aplanada y devuelve el id del
/// gesto, o la etiqueta centinela si no hay gesto con confianza suficiente.
pub trait GestureClassifier {
    fn classify(&mut self, window: &[f32]) -> Result<i32, ClassifierError>;

    /// Valor reservado para "sin gesto"
    fn sentinel(&self) -> i32;
}

/// Elige la clase ganadora. Por debajo del umbral devuelve `sentinel`.
pub fn select_label(scores: &[f32], score_threshold: f32, sentinel: i32) -> Result<i32, ClassifierError> {
    let (index, &score) = scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .ok_or(ClassifierError::NoScores)?;

    // NaN nunca supera el umbral
    if score >= score_threshold {
        Ok(index as i32)
    } else {
        Ok(sentinel)
    }
}

#[derive(Debug, Deserialize)]
struct ClassesJson {
    index_to_class: HashMap<String, String>,
}

/// Nombres legibles de los ids de gesto (sólo para logs)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureLabels {
    names: BTreeMap<usize, String>,
}

impl GestureLabels {
    /// Carga un JSON `{"index_to_class": {"0": "left", ...}}`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ClassifierError> {
        let data: ClassesJson = serde_json::from_str(content)?;

        // Las claves que no son índices se ignoran
        let names = data
            .index_to_class
            .into_iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
            .collect();

        Ok(Self { names })
    }

    pub fn name(&self, gesture_id: i32) -> Option<&str> {
        usize::try_from(gesture_id)
            .ok()
            .and_then(|idx| self.names.get(&idx))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Texto para logs: "3 (right)" o "3"
    pub fn describe(&self, gesture_id: i32) -> String {
        match self.name(gesture_id) {
            Some(name) => format!("{} ({})", gesture_id, name),
            None => gesture_id.to_string(),
        }
    }
}

/// Nombres de la entrada y de la salida de probabilidades del modelo.
/// Se prefiere la primera salida f32; si no hay, la primera salida.
fn discover_io(session: &Session) -> Result<(String, String), ClassifierError> {
    let input = session
        .inputs
        .first()
        .ok_or(ClassifierError::MissingIo { kind: "input" })?;

    let is_scores = |ty: &ValueType| {
        matches!(
            ty,
            ValueType::Tensor {
                ty: TensorElementType::Float32,
                ..
            }
        )
    };
    let output = session
        .outputs
        .iter()
        .find(|output| is_scores(&output.output_type))
        .or_else(|| session.outputs.first())
        .ok_or(ClassifierError::MissingIo { kind: "output" })?;

    Ok((input.name.clone(), output.name.clone()))
}

/// Clasificador respaldado por un modelo ONNX con salida de probabilidades
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    prob_output_name: String,
    window_len: usize,
    score_threshold: f32,
    sentinel: i32,
}

impl OnnxClassifier {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        window_len: usize,
        settings: &ClassifierConfig,
        labels: Option<&GestureLabels>,
    ) -> Result<Self, ClassifierError> {
        if let Some(labels) = labels {
            if labels.name(settings.sentinel).is_some() {
                return Err(ClassifierError::SentinelCollision {
                    sentinel: settings.sentinel,
                    classes: labels.len(),
                });
            }
        }

        let model_path = model_path.as_ref();
        let session = Session::builder()?.commit_from_file(model_path)?;

        let (input_name, prob_output_name) = discover_io(&session)?;

        info!("[ONNX] Modelo cargado: {}", model_path.display());
        info!("[ONNX] Input: {} [1, {}]", input_name, window_len);
        info!("[ONNX] Output: {}", prob_output_name);
        info!(
            "[ONNX] Umbral: {:.2}, centinela: {}",
            settings.score_threshold, settings.sentinel
        );

        Ok(Self {
            session,
            input_name,
            prob_output_name,
            window_len,
            score_threshold: settings.score_threshold,
            sentinel: settings.sentinel,
        })
    }

    /// Probabilidades por clase para una ventana
    pub fn predict_scores(&mut self, window: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        if window.len() != self.window_len {
            return Err(ClassifierError::InvalidWindowSize {
                expected: self.window_len,
                actual: window.len(),
            });
        }

        // Tensor de entrada [1, TIME_STEPS * DIMENSION]
        let shape_vec = vec![1_usize, self.window_len];
        let input_value = ort::value::Value::from_array((shape_vec, window.to_vec()))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (prob_shape, prob_data) =
            outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

        let num_classes = if prob_shape.len() >= 2 {
            prob_shape[1] as usize
        } else {
            prob_data.len()
        };

        Ok(prob_data.iter().take(num_classes).copied().collect())
    }
}

impl GestureClassifier for OnnxClassifier {
    fn classify(&mut self, window: &[f32]) -> Result<i32, ClassifierError> {
        let scores = self.predict_scores(window)?;
        select_label(&scores, self.score_threshold, self.sentinel)
    }

    fn sentinel(&self) -> i32 {
        self.sentinel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_SCORE_THRESHOLD, SENTINEL_LABEL};

    #[test]
    fn test_select_label_confident() {
        let scores = [0.01, 0.02, 0.96, 0.01];
        assert_eq!(
            select_label(&scores, DEFAULT_SCORE_THRESHOLD, SENTINEL_LABEL).unwrap(),
            2
        );
    }

    #[test]
    fn test_select_label_below_threshold_is_sentinel() {
        let scores = [0.3, 0.5, 0.2];
        assert_eq!(
            select_label(&scores, DEFAULT_SCORE_THRESHOLD, SENTINEL_LABEL).unwrap(),
            SENTINEL_LABEL
        );
    }

    #[test]
    fn test_select_label_threshold_is_inclusive() {
        assert_eq!(select_label(&[0.25, 0.75], 0.75, -1).unwrap(), 1);
    }

    #[test]
    fn test_select_label_empty_scores() {
        assert!(matches!(
            select_label(&[], 0.5, SENTINEL_LABEL),
            Err(ClassifierError::NoScores)
        ));
    }

    #[test]
    fn test_labels_from_json() {
        let labels = GestureLabels::from_json(
            r#"{"index_to_class": {"0": "left", "1": "up", "4": "switch", "x": "ignored"}}"#,
        )
        .unwrap();

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(4), Some("switch"));
        assert_eq!(labels.name(2), None);
        assert_eq!(labels.name(-1), None);
        assert_eq!(labels.describe(0), "0 (left)");
        assert_eq!(labels.describe(998), "998");
    }

    #[test]
    fn test_missing_model_is_error() {
        let result = OnnxClassifier::new("missing.onnx", 966, &ClassifierConfig::default(), None);
        assert!(matches!(result, Err(ClassifierError::OnnxError(_))));
    }

    #[test]
    fn test_sentinel_collision_detected_before_loading_model() {
        let labels = GestureLabels::from_json(r#"{"index_to_class": {"0": "left", "1": "up"}}"#).unwrap();
        let settings = ClassifierConfig {
            score_threshold: 0.9,
            sentinel: 1,
        };

        let result = OnnxClassifier::new("missing.onnx", 966, &settings, Some(&labels));
        assert!(matches!(
            result,
            Err(ClassifierError::SentinelCollision { sentinel: 1, classes: 2 })
        ));
    }
}

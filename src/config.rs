//! Configuración del daemon (YAML)

use crate::types::{DEFAULT_SCORE_THRESHOLD, SENTINEL_LABEL, TIME_STEPS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuración completa
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Puerto serie del detector
    pub serial: SerialConfig,

    /// Reintentos al abrir el puerto
    pub retry: RetryConfig,

    /// Rutas del modelo
    pub model: ModelConfig,

    /// Parámetros del clasificador
    pub classifier: ClassifierConfig,

    /// Ventana temporal
    pub window: WindowConfig,

    /// Protocolo de salida
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Timeout de lectura; al expirar se sigue esperando
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// `None` = reintentar indefinidamente
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Modelo ONNX del clasificador de ventanas
    pub path: PathBuf,

    /// JSON opcional con nombres de clases (index_to_class)
    pub labels: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Confianza mínima; por debajo se devuelve `sentinel`
    pub score_threshold: f32,
    pub sentinel: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub time_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Línea que se escribe cuando el detector está listo
    pub ready_marker: String,

    /// No repetir un gesto igual al último emitido
    pub suppress_repeats: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let port = if cfg!(windows) { "COM3" } else { "/dev/ttyUSB0" };
        Self {
            port: port.to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 5_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay_ms: 1_000,
            backoff_factor: 1.0,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model/point_history_classifier/hand_classifier_v2.onnx"),
            labels: None,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            sentinel: SENTINEL_LABEL,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            time_steps: TIME_STEPS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ready_marker: "#".to_string(),
            suppress_repeats: false,
        }
    }
}

impl Config {
    /// Carga la configuración desde un fichero YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Guarda la configuración en un fichero YAML
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Valida rangos; no comprueba que el modelo exista
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::Invalid("Serial port must not be empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid(
                "Baud rate must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "Retry max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "Retry backoff_factor must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.classifier.score_threshold) {
            return Err(ConfigError::Invalid(
                "Score threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.window.time_steps == 0 {
            return Err(ConfigError::Invalid(
                "Window time_steps must be greater than 0".to_string(),
            ));
        }
        if self.output.ready_marker.contains('\n') {
            return Err(ConfigError::Invalid(
                "Ready marker must be a single line".to_string(),
            ));
        }

        Ok(())
    }
}

/// Ejemplo de fichero de configuración
pub const EXAMPLE_CONFIG: &str = r##"# mano-serial

serial:
  port: "/dev/ttyUSB0"
  baud_rate: 115200
  read_timeout_ms: 5000

# max_attempts: null = reintentar siempre
retry:
  max_attempts: null
  initial_delay_ms: 1000
  backoff_factor: 1.0
  max_delay_ms: 30000

model:
  path: "model/point_history_classifier/hand_classifier_v2.onnx"
  labels: null

classifier:
  score_threshold: 0.95
  sentinel: 998

window:
  time_steps: 23

output:
  ready_marker: "#"
  suppress_repeats: false
"##;

use crate::config::{RetryConfig, SerialConfig};
use log::{info, warn};
use serialport::SerialPort;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Gave up on {target} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        last_error: String,
    },
}

/// Política de reintentos para adquirir el dispositivo.
/// `max_attempts = None` reintenta indefinidamente.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Espera antes del intento `attempt + 1` (attempt empieza en 1)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Ejecuta `op` hasta que tenga éxito o se agote la política
pub fn retry_with<T, E, F>(policy: &RetryPolicy, target: &str, mut op: F) -> Result<T, TransportError>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !policy.allows_retry_after(attempt) {
                    return Err(TransportError::RetriesExhausted {
                        target: target.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    "❌ {} no disponible (intento {}): {}. Reintentando en {:.1}s...",
                    target,
                    attempt,
                    e,
                    delay.as_secs_f64()
                );
                std::thread::sleep(delay);
            }
        }
    }
}

/// Abre el puerto serie del detector, reintentando según la política
pub fn open_serial(
    serial: &SerialConfig,
    policy: &RetryPolicy,
) -> Result<Box<dyn SerialPort>, TransportError> {
    let port = retry_with(policy, &serial.port, || {
        serialport::new(serial.port.as_str(), serial.baud_rate)
            .timeout(Duration::from_millis(serial.read_timeout_ms))
            .open()
    })?;

    info!("✅ Puerto {} abierto a {} baudios", serial.port, serial.baud_rate);
    Ok(port)
}

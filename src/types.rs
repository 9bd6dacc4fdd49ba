/// Número de keypoints de una mano
pub const NUM_KEYPOINTS: usize = 21;

/// Coordenadas por keypoint (x, y)
pub const COORDS_PER_KEYPOINT: usize = 2;

/// Valores por frame: 21 keypoints x 2 coordenadas
pub const DIMENSION: usize = NUM_KEYPOINTS * COORDS_PER_KEYPOINT; // 42

/// Frames por ventana temporal
pub const TIME_STEPS: usize = 23;

/// Longitud de la ventana aplanada que recibe el clasificador
pub const WINDOW_LEN: usize = TIME_STEPS * DIMENSION; // 966

/// Keypoint de referencia para la traslación (muñeca)
pub const WRIST: usize = 0;

/// Keypoint de referencia para la escala (base del meñique)
pub const PINKY_MCP: usize = 17;

/// Etiqueta reservada: "ningún gesto con confianza suficiente"
pub const SENTINEL_LABEL: i32 = 998;

/// Umbral de confianza por defecto del clasificador
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.95;

/// Frame crudo: 21 pares (x, y) de un instante
pub type Frame = [f32; DIMENSION];

/// Offset plano de la coordenada x de un keypoint
pub const fn keypoint_offset(keypoint: usize) -> usize {
    keypoint * COORDS_PER_KEYPOINT
}

/// Frame ya normalizado: muñeca en el origen y escala unitaria
/// muñeca→meñique. Sólo se construye desde `normalizer::normalize`,
/// así que todos sus valores son finitos.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedFrame(pub(crate) Frame);

impl NormalizedFrame {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Frame {
        self.0
    }

    /// Coordenadas (x, y) de un keypoint
    pub fn keypoint(&self, keypoint: usize) -> (f32, f32) {
        let base = keypoint_offset(keypoint);
        (self.0[base], self.0[base + 1])
    }
}

impl AsRef<[f32]> for NormalizedFrame {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(DIMENSION, 42);
        assert_eq!(WINDOW_LEN, 966);
        assert_eq!(keypoint_offset(PINKY_MCP), 34);
    }
}

use crate::types::{keypoint_offset, Frame, NormalizedFrame, DIMENSION, PINKY_MCP, WRIST};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Invalid frame size: expected {expected}, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Non-finite input value {value} at index {index}")]
    NonFiniteInput { index: usize, value: f32 },

    /// El keypoint 17 coincide con la muñeca: no hay escala de referencia
    #[error("Degenerate frame: keypoint 17 coincides with the wrist")]
    DegenerateScale,

    #[error("Normalization produced a non-finite value at index {index} (scale={scale})")]
    NonFiniteOutput { index: usize, scale: f32 },
}

/// Normaliza un frame de 42 valores:
/// 1. Traslada todos los keypoints para que la muñeca quede en (0,0)
/// 2. Divide por la distancia muñeca→keypoint 17, calculada DESPUÉS de trasladar
///
/// El resultado es invariante a la posición y al tamaño de la mano en la imagen.
/// Los frames degenerados se rechazan en lugar de propagar NaN/Inf.
pub fn normalize(frame: &[f32]) -> Result<NormalizedFrame, NormalizeError> {
    if frame.len() != DIMENSION {
        return Err(NormalizeError::WrongLength {
            expected: DIMENSION,
            actual: frame.len(),
        });
    }

    if let Some((index, &value)) = frame.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(NormalizeError::NonFiniteInput { index, value });
    }

    let mut points: Frame = [0.0; DIMENSION];
    points.copy_from_slice(frame);

    // Paso 1: muñeca al origen
    let ref_base = keypoint_offset(WRIST);
    let (ref_x, ref_y) = (points[ref_base], points[ref_base + 1]);
    for pair in points.chunks_exact_mut(2) {
        pair[0] -= ref_x;
        pair[1] -= ref_y;
    }

    // Paso 2: escala por la distancia muñeca→meñique (ya trasladada)
    let scale_base = keypoint_offset(PINKY_MCP);
    let scale = points[scale_base].hypot(points[scale_base + 1]);
    if scale == 0.0 {
        return Err(NormalizeError::DegenerateScale);
    }

    for (index, value) in points.iter_mut().enumerate() {
        *value /= scale;
        if !value.is_finite() {
            return Err(NormalizeError::NonFiniteOutput { index, scale });
        }
    }

    Ok(NormalizedFrame(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TOLERANCE: f32 = 1e-4;

    fn random_frame(rng: &mut StdRng) -> Frame {
        let mut frame = [0.0f32; DIMENSION];
        for v in frame.iter_mut() {
            *v = rng.gen_range(0.0..640.0);
        }
        // Asegurar que el keypoint 17 no coincide con la muñeca
        frame[34] = frame[0] + rng.gen_range(20.0..120.0);
        frame[35] = frame[1] + rng.gen_range(-80.0..80.0);
        frame
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!(
                (x - y).abs() <= TOLERANCE,
                "index {}: {} vs {}",
                i,
                x,
                y
            );
        }
    }

    #[test]
    fn test_wrist_at_origin_and_unit_scale() {
        let mut rng = StdRng::seed_from_u64(7);
        let frame = random_frame(&mut rng);
        let normalized = normalize(&frame).unwrap();

        assert_eq!(normalized.keypoint(WRIST), (0.0, 0.0));
        let (px, py) = normalized.keypoint(PINKY_MCP);
        assert!((px.hypot(py) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_known_values() {
        let mut frame = [0.0f32; DIMENSION];
        frame[0] = 10.0;
        frame[1] = 20.0;
        frame[2] = 13.0; // keypoint 1 -> (3, 4)
        frame[3] = 24.0;
        frame[34] = 10.0; // keypoint 17 -> (0, 5)
        frame[35] = 25.0;

        let normalized = normalize(&frame).unwrap();
        assert_eq!(normalized.keypoint(1), (0.6, 0.8));
        assert_eq!(normalized.keypoint(PINKY_MCP), (0.0, 1.0));
        // El resto de keypoints estaban en (0,0): quedan en -(muñeca)/escala
        assert_eq!(normalized.keypoint(5), (-2.0, -4.0));
    }

    #[test]
    fn test_idempotent() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let once = normalize(&random_frame(&mut rng)).unwrap();
            let twice = normalize(once.as_slice()).unwrap();
            assert_close(once.as_slice(), twice.as_slice());
        }
    }

    #[test]
    fn test_translation_invariance() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..50 {
            let frame = random_frame(&mut rng);
            let (dx, dy) = (rng.gen_range(-300.0..300.0), rng.gen_range(-300.0..300.0));
            let mut shifted = frame;
            for pair in shifted.chunks_exact_mut(2) {
                pair[0] += dx;
                pair[1] += dy;
            }
            assert_close(
                normalize(&frame).unwrap().as_slice(),
                normalize(&shifted).unwrap().as_slice(),
            );
        }
    }

    #[test]
    fn test_scale_invariance() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let frame = random_frame(&mut rng);
            let k: f32 = rng.gen_range(0.25..8.0);
            let scaled = frame.map(|v| v * k);
            assert_close(
                normalize(&frame).unwrap().as_slice(),
                normalize(&scaled).unwrap().as_slice(),
            );
        }
    }

    #[test]
    fn test_degenerate_scale_rejected() {
        let mut frame = [0.0f32; DIMENSION];
        frame[0] = 5.0;
        frame[1] = 5.0;
        frame[34] = 5.0;
        frame[35] = 5.0;
        assert_eq!(normalize(&frame), Err(NormalizeError::DegenerateScale));

        // Detección vacía (todo ceros)
        assert_eq!(
            normalize(&[0.0; DIMENSION]),
            Err(NormalizeError::DegenerateScale)
        );
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = normalize(&[1.0; 40]).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::WrongLength {
                expected: DIMENSION,
                actual: 40
            }
        );
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut frame = random_frame(&mut rng);
        frame[9] = f32::NAN;
        assert!(matches!(
            normalize(&frame),
            Err(NormalizeError::NonFiniteInput { index: 9, .. })
        ));
    }

    #[test]
    fn test_subnormal_scale_overflow_rejected() {
        let mut frame = [0.0f32; DIMENSION];
        frame[34] = f32::MIN_POSITIVE / 4.0;
        frame[2] = 1.0e30;
        assert!(matches!(
            normalize(&frame),
            Err(NormalizeError::NonFiniteOutput { .. })
        ));
    }
}

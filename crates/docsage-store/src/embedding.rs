//! uint8 embedding quantization.
//!
//! Each vector is stored as one byte per dimension plus a per-vector scale and
//! offset: `value ≈ byte * scale + offset`.

use ndarray::Array1;

/// A quantized embedding as persisted in the `records` table.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedEmbedding {
    pub bytes: Vec<u8>,
    pub scale: f32,
    pub offset: f32,
}

impl QuantizedEmbedding {
    /// Map `[min, max]` linearly onto `[0, 255]`.
    pub fn quantize(embedding: &Array1<f32>) -> Self {
        let min_val = embedding.iter().copied().fold(f32::INFINITY, f32::min);
        let max_val = embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let range = max_val - min_val;
        if !range.is_finite() || range < 1e-9 {
            // Constant (or empty) vector
            let offset = if min_val.is_finite() { min_val } else { 0.0 };
            return Self {
                bytes: vec![0u8; embedding.len()],
                scale: 0.0,
                offset,
            };
        }

        let scale = range / 255.0;
        let bytes = embedding
            .iter()
            .map(|&v| ((v - min_val) / scale).round().clamp(0.0, 255.0) as u8)
            .collect();

        Self {
            bytes,
            scale,
            offset: min_val,
        }
    }

    pub fn dequantize(&self) -> Array1<f32> {
        Array1::from_iter(self.bytes.iter().map(|&b| b as f32 * self.scale + self.offset))
    }

    pub fn dimension(&self) -> usize {
        self.bytes.len()
    }
}

/// Normalize to unit length; `None` for (near-)zero vectors.
pub fn normalized(v: &Array1<f32>) -> Option<Array1<f32>> {
    let norm = v.dot(v).sqrt();
    if norm < 1e-9 {
        None
    } else {
        Some(v / norm)
    }
}

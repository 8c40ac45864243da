//! all-MiniLM-L6-v2 sentence embeddings through ONNX Runtime.
//!
//! Expects `model.onnx` and `tokenizer.json` in the model directory. Output is
//! mean-pooled over the attention mask and L2-normalized, matching
//! SentenceTransformers' `encode` for this model.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{info, warn};

    use crate::cache::{CacheStats, QueryCache};
    use crate::embedder::{EmbedderBackend, EmbeddingResult};

    const MAX_SEQ_LEN: usize = 256;
    const DEFAULT_DIM: usize = 384;
    const MODEL_NAME: &str = "all-MiniLM-L6-v2";

    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        cache: QueryCache,
        dimension: usize,
    }

    struct Encoded {
        ids: Vec<i64>,
        mask: Vec<i64>,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, String> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(format!("Model not found: {}", model_path.display()));
            }
            if !tokenizer_path.exists() {
                return Err(format!("Tokenizer not found: {}", tokenizer_path.display()));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| format!("Failed to create session builder: {}", e))?
                .with_intra_threads(2)
                .map_err(|e| format!("Failed to set threads: {}", e))?
                .commit_from_file(&model_path)
                .map_err(|e| format!("Failed to load ONNX model: {}", e))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| format!("Failed to load tokenizer: {}", e))?;

            info!("Loaded {} from {}", MODEL_NAME, model_path.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                cache: QueryCache::default_cache(),
                dimension: DEFAULT_DIM,
            })
        }

        fn encode(&self, text: &str) -> Option<Encoded> {
            let encoding = match self.tokenizer.encode(text, true) {
                Ok(e) => e,
                Err(e) => {
                    warn!("Tokenization failed: {}", e);
                    return None;
                }
            };
            let len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            Some(Encoded {
                ids: encoding.get_ids()[..len].iter().map(|&id| id as i64).collect(),
                mask: encoding.get_attention_mask()[..len]
                    .iter()
                    .map(|&m| m as i64)
                    .collect(),
            })
        }

        fn infer(&self, text: &str) -> Option<Array1<f32>> {
            let encoded = self.encode(text)?;
            let seq_len = encoded.ids.len();
            if seq_len == 0 {
                return None;
            }
            let mask_f32: Vec<f32> = encoded.mask.iter().map(|&m| m as f32).collect();

            let ids = Tensor::from_array(([1usize, seq_len], encoded.ids))
                .map_err(|e| warn!("Failed to create ids tensor: {}", e))
                .ok()?;
            let mask = Tensor::from_array(([1usize, seq_len], encoded.mask))
                .map_err(|e| warn!("Failed to create mask tensor: {}", e))
                .ok()?;
            let type_ids = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))
                .map_err(|e| warn!("Failed to create type_ids tensor: {}", e))
                .ok()?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids, mask, type_ids])
                .map_err(|e| warn!("ONNX inference failed: {}", e))
                .ok()?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| warn!("Failed to extract output tensor: {}", e))
                .ok()?;
            let dims: Vec<i64> = shape.iter().copied().collect();

            let pooled = match dims.as_slice() {
                // token embeddings [1, seq_len, dim]
                [_, _, dim] => mean_pool(data, &mask_f32, *dim as usize)?,
                // sentence embedding [1, dim]
                [_, dim] => Array1::from_vec(data[..*dim as usize].to_vec()),
                other => {
                    warn!("Unexpected output shape: {:?}", other);
                    return None;
                }
            };

            Some(l2_normalize(pooled))
        }
    }

    fn mean_pool(data: &[f32], mask: &[f32], dim: usize) -> Option<Array1<f32>> {
        let mask_sum: f32 = mask.iter().sum();
        if mask_sum < 1e-9 {
            return None;
        }
        let mut pooled = Array1::<f32>::zeros(dim);
        for (token, &m) in mask.iter().enumerate() {
            if m > 0.0 {
                let row = &data[token * dim..(token + 1) * dim];
                for (acc, &v) in pooled.iter_mut().zip(row) {
                    *acc += v * m;
                }
            }
        }
        Some(pooled / mask_sum)
    }

    fn l2_normalize(v: Array1<f32>) -> Array1<f32> {
        let norm = v.dot(&v).sqrt();
        if norm > 1e-9 {
            v / norm
        } else {
            v
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn embed(&self, text: &str) -> Option<EmbeddingResult> {
            if let Some(embedding) = self.cache.get(text) {
                return Some(EmbeddingResult { embedding });
            }

            let embedding = self.infer(text)?;
            self.cache.put(text.to_string(), embedding.clone());
            Some(EmbeddingResult { embedding })
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            MODEL_NAME
        }

        fn cache_stats(&self) -> Option<CacheStats> {
            Some(self.cache.stats())
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;

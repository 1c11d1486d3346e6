//! Local transformer encoder (XLM-RoBERTa family, e.g. BGE-M3) loaded
//! through candle. Mean pooling over the attention mask, L2-normalized
//! output. Immutable after load, so concurrent embedding calls are safe.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XlmRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::info;

use crate::device::select_device;
use crate::EmbeddingProvider;
use triage_core::error::{Error, Result};

const MAX_LEN: usize = 256;

pub struct LocalModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
}

impl LocalModel {
    /// Load tokenizer, config and weights from a model directory. A missing
    /// or malformed artifact is a configuration error, fatal at
    /// construction.
    pub fn load(model_dir: PathBuf) -> Result<Self> {
        if !model_dir.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "embedding model directory not found: {}",
                model_dir.display()
            )));
        }
        let device = select_device();

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| Error::InvalidConfig(format!("tokenizer.json: {e}")))?;

        let config_raw = std::fs::read_to_string(model_dir.join("config.json"))
            .map_err(|e| Error::InvalidConfig(format!("config.json: {e}")))?;
        let config: XlmRobertaConfig = serde_json::from_str(&config_raw)
            .map_err(|e| Error::InvalidConfig(format!("config.json: {e}")))?;
        let dim = config.hidden_size;

        let weights = read_weights(&model_dir.join("pytorch_model.bin"), &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)
            .map_err(|e| Error::InvalidConfig(format!("model weights: {e}")))?;

        info!(dim, model_dir = %model_dir.display(), "embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            dim,
        })
    }

    fn forward(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let enc = self
            .tokenizer
            .encode(text, true)
            .map_err(candle_core::Error::wrap)?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(MAX_LEN);
        mask.truncate(MAX_LEN);
        if ids.len() < MAX_LEN {
            let pad = MAX_LEN - ids.len();
            ids.extend(std::iter::repeat(1).take(pad));
            mask.extend(std::iter::repeat(0).take(pad));
        }

        let input_ids = Tensor::from_iter(ids, &self.device)?.reshape((1, MAX_LEN))?;
        let attention_mask = Tensor::from_iter(mask, &self.device)?.reshape((1, MAX_LEN))?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;

        // Mean pooling over the attention mask, then L2 normalization.
        let mask = attention_mask.to_dtype(hidden.dtype())?;
        let mask_3d = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
        let summed = (&hidden * &mask_3d)?.sum(1)?;
        let counts = mask.sum(1)?.unsqueeze(1)?.to_dtype(summed.dtype())?;
        let mut emb = summed.broadcast_div(&counts)?;

        let eps = Tensor::new(&[1e-12f32], &self.device)?
            .to_dtype(emb.dtype())?
            .unsqueeze(0)?;
        let norm = emb.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
        emb = emb.broadcast_div(&norm)?;

        emb.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()
    }
}

fn read_weights(
    path: &Path,
    device: &Device,
) -> Result<std::collections::HashMap<String, Tensor>> {
    let tensors = candle_core::pickle::read_all(path)
        .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
    let mut map = std::collections::HashMap::new();
    for (name, tensor) in tensors {
        let tensor = tensor
            .to_device(device)
            .map_err(|e| Error::InvalidConfig(format!("{name}: {e}")))?;
        map.insert(name, tensor);
    }
    Ok(map)
}

impl EmbeddingProvider for LocalModel {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.forward(text)
            .map_err(|e| Error::Operation(format!("embedding failed: {e}")))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

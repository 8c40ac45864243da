//! Shared application state and the request pipeline.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::info;

use docsage_chat::{Answer, Conversation, HostedAnswerGenerator, HostedVisionDescriber, LLMConfig, QueryEngine};
use docsage_core::{DocSageConfig, Result};
use docsage_infer::EmbedderBackend;
use docsage_ingest::{IngestOptions, IngestReport, Ingester, PdfExtractor};
use docsage_store::VectorIndex;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: DocSageConfig,
    pub index: VectorIndex,
    pub llm_config: RwLock<LLMConfig>,
    pub conversation: RwLock<Conversation>,
    /// Held for the whole of an ingestion or query request.
    pipeline: Mutex<()>,
}

impl AppState {
    pub fn new(config: DocSageConfig, embedder: Arc<dyn EmbedderBackend>) -> Result<Self> {
        let index = VectorIndex::open(
            &config.data_paths.vectordb,
            &config.collection,
            embedder,
            config.id_strategy,
        )?;
        let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);

        Ok(Self {
            config,
            index,
            llm_config: RwLock::new(llm_config),
            conversation: RwLock::new(Conversation::new()),
            pipeline: Mutex::new(()),
        })
    }

    /// Why ingestion and queries will fail for lack of an API key, if they will.
    pub fn credential_warning(&self) -> Option<String> {
        self.llm_config.read().require_provider().err().map(|e| e.to_string())
    }

    fn extractor(&self) -> Result<PdfExtractor> {
        let describer = HostedVisionDescriber::from_config(&self.llm_config.read())?;
        Ok(PdfExtractor::with_options(
            Arc::new(describer),
            IngestOptions {
                skip_failed_descriptions: self.config.skip_failed_descriptions,
            },
        ))
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let _guard = self.pipeline.lock().await;
        let extractor = self.extractor()?;
        Ingester::new(&extractor, &self.index).ingest_file(path).await
    }

    pub async fn ingest_bytes(&self, bytes: &[u8], source: &str) -> Result<IngestReport> {
        let _guard = self.pipeline.lock().await;
        let extractor = self.extractor()?;
        Ingester::new(&extractor, &self.index)
            .ingest_bytes(bytes, source)
            .await
    }

    /// Answer a question; the exchange is recorded only when it succeeds.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let _guard = self.pipeline.lock().await;
        let generator = HostedAnswerGenerator::from_config(&self.llm_config.read())?;
        let answer = QueryEngine::new(&self.index, Arc::new(generator))
            .with_top_k(self.config.top_k)
            .answer(question)
            .await?;

        self.conversation.write().push_exchange(question, &answer.text);
        info!("Answered with {} sources", answer.sources.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_infer::HashingEmbedder;
    use tempfile::TempDir;

    #[test]
    fn test_credential_warning() {
        let dir = TempDir::new().unwrap();
        let config = DocSageConfig::new(dir.path()).unwrap();
        let state = AppState::new(config, Arc::new(HashingEmbedder::new(384))).unwrap();

        *state.llm_config.write() = LLMConfig {
            preferred_provider: "groq".into(),
            groq_api_key: None,
            ..Default::default()
        };
        let warning = state.credential_warning().unwrap();
        assert!(warning.contains("GROQ_API_KEY"));

        state.llm_config.write().groq_api_key = Some("gsk".into());
        assert!(state.credential_warning().is_none());
    }
}

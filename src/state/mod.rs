use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::GenerationClient;
use crate::pipeline::prompt::PromptBuilder;
use crate::pipeline::{PipelineOptions, StrategyPipeline};
use crate::rag::IndexHandle;
use crate::tools::{MediaSearch, WebMediaSearch};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// The vector index is opened lazily on first use, so startup never waits
/// on the embedding server or the store.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub index: Arc<IndexHandle>,
    pub generator: Arc<GenerationClient>,
    pub media: Arc<dyn MediaSearch>,
    pub pipeline: Arc<StrategyPipeline>,
}

impl AppState {
    /// Loads configuration and wires every service.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let raw = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let settings = Arc::new(Settings::from_config(&raw));

        tracing::debug!(
            config = %config.redact_sensitive_values(&raw),
            "Configuration loaded"
        );

        let media: Arc<dyn MediaSearch> = Arc::new(
            WebMediaSearch::new(settings.media.clone(), settings.timeouts.media)
                .map_err(|e| InitializationError::Media(e.into()))?,
        );

        Ok(Self::assemble(paths, config, settings, media))
    }

    /// Builds the state from already constructed collaborators.
    pub fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Arc<Settings>,
        media: Arc<dyn MediaSearch>,
    ) -> Arc<Self> {
        let index = Arc::new(IndexHandle::from_settings(paths.clone(), settings.clone()));
        let generator = Arc::new(GenerationClient::from_settings(
            &settings.generation,
            settings.timeouts.generation,
        ));
        Self::with_services(paths, config, settings, index, generator, media)
    }

    pub fn with_services(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Arc<Settings>,
        index: Arc<IndexHandle>,
        generator: Arc<GenerationClient>,
        media: Arc<dyn MediaSearch>,
    ) -> Arc<Self> {
        let generation = &settings.generation;
        let prompts = PromptBuilder::new(
            generation.temperature,
            generation.solve_temperature,
            generation.emergency_threshold_minutes,
        );
        let pipeline = Arc::new(StrategyPipeline::new(
            index.clone(),
            generator.clone(),
            media.clone(),
            prompts,
            PipelineOptions::from_settings(&paths, &settings),
        ));

        Arc::new(AppState {
            paths,
            config,
            settings,
            index,
            generator,
            media,
            pipeline,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::*;
    use crate::llm::RetryPolicy;
    use crate::rag::chunker::{ChunkUnit, Chunker};
    use crate::rag::embedder::testing::LetterEmbedder;
    use crate::rag::index::{IndexTimeouts, VectorIndex};
    use crate::rag::memory::MemoryVectorStore;
    use crate::rag::DistanceMetric;
    use crate::tools::media::testing::StaticMediaSearch;

    /// State over an in-memory index, no generation provider and canned media.
    pub fn test_state(
        dir: &std::path::Path,
        media: StaticMediaSearch,
    ) -> (Arc<AppState>, Arc<VectorIndex>) {
        let paths = Arc::new(AppPaths::with_dirs(dir.to_path_buf(), dir.to_path_buf()));
        let config = ConfigService::new(paths.clone());
        let settings = Arc::new(Settings::default());
        let index = Arc::new(VectorIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(LetterEmbedder::new("letters")),
            Chunker::new(200, 20, ChunkUnit::Chars).unwrap(),
            "ncf_documents",
            DistanceMetric::Cosine,
            IndexTimeouts {
                embedding: Duration::from_secs(1),
                vector_query: Duration::from_secs(1),
            },
        ));
        let generator = Arc::new(GenerationClient::new(
            None,
            RetryPolicy::default(),
            Duration::from_secs(1),
            100,
        ));
        let state = AppState::with_services(
            paths,
            config,
            settings,
            Arc::new(IndexHandle::ready(index.clone())),
            generator,
            Arc::new(media),
        );
        (state, index)
    }
}

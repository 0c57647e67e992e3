//! Request orchestration: retrieve, prompt, generate, enrich, assemble.
//!
//! The strategy path never fails. Each stage runs through [`degrade`] and the
//! fallback catalog covers anything generation could not deliver.

pub mod degrade;
pub mod fallback;
pub mod prompt;
pub mod resources;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::config::{AppPaths, Settings};
use crate::llm::{GenerationClient, Solution, Strategy};
use crate::rag::{
    format_context, gate, GatedContext, IndexHandle, IndexReport, IndexStats, RagError, Retriever,
};
use crate::tools::{MediaSearch, SearchResult, VideoResult};

use self::degrade::{degrade, degrade_with};
use self::prompt::{Language, PromptBuilder, SolveContext, StrategyContext};

pub use self::degrade::StageOutcome;

pub const MAX_QUERY_CHARS: usize = 500;
const MEDIA_QUERY_CHARS: usize = 30;

fn default_time_left() -> u32 {
    10
}

fn english() -> Language {
    Language::En
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRequest {
    pub query: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub class_size: Option<u32>,
    #[serde(default = "default_time_left")]
    pub time_left_minutes: u32,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub extra_context: Option<String>,
}

impl StrategyRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if self.query.chars().count() > MAX_QUERY_CHARS {
            return Err(format!("query must be at most {} characters", MAX_QUERY_CHARS));
        }
        if !(1..=60).contains(&self.time_left_minutes) {
            return Err("time_left_minutes must be between 1 and 60".to_string());
        }
        if let Some(size) = self.class_size {
            if !(1..=100).contains(&size) {
                return Err("class_size must be between 1 and 100".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub strategies: Vec<Strategy>,
    pub sources_used: Vec<String>,
    pub confidence_score: f64,
    pub videos: Vec<VideoResult>,
    pub ncf_used: bool,
    /// Set when the strategies came from the fallback catalog.
    pub offline_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    pub text: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default = "english")]
    pub language: Language,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveResponse {
    pub success: bool,
    pub data: Solution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SolveResponse {
    fn failed(error: String) -> Self {
        Self {
            success: false,
            data: Solution {
                solution_markdown: format!("**Error generating solution:** {}", error),
                steps: Vec::new(),
                concept_explanation: "Service unavailable".to_string(),
                difficulty_level: "Unknown".to_string(),
                detected_subject: "Unknown".to_string(),
            },
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    pub title: String,
    pub subtitle: String,
    pub content: String,
    pub link: String,
    pub relevance: f64,
}

impl From<SearchResult> for DocumentHit {
    fn from(result: SearchResult) -> Self {
        Self {
            title: result.title,
            subtitle: result.source.to_string(),
            content: result.snippet,
            link: result.url,
            relevance: 1.0,
        }
    }
}

/// One entry of the combined search list, tagged with `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UnifiedResult {
    Video(VideoResult),
    Pdf(DocumentHit),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub max_context_tokens: usize,
    pub relevance_threshold: f64,
    pub media_enabled: bool,
    pub video_limit: usize,
    pub document_limit: usize,
    pub llm_query_rewrite: bool,
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
    pub rewrite_timeout: Duration,
    pub media_timeout: Duration,
    pub default_pdf_path: PathBuf,
}

impl PipelineOptions {
    pub fn from_settings(paths: &AppPaths, settings: &Settings) -> Self {
        let generation = &settings.generation;
        let timeouts = &settings.timeouts;

        // Every attempt may use the full per-call timeout, plus the backoff
        // sleeps between them.
        let attempts = generation.max_retries.saturating_add(1);
        let backoff: Duration = (0..generation.max_retries)
            .map(|i| generation.initial_backoff.saturating_mul(2u32.saturating_pow(i)))
            .sum();

        Self {
            top_k: settings.rag.top_k,
            max_context_tokens: settings.rag.max_context_tokens,
            relevance_threshold: settings.rag.relevance_threshold,
            media_enabled: settings.media.enabled,
            video_limit: settings.media.video_limit,
            document_limit: settings.media.document_limit,
            llm_query_rewrite: settings.media.llm_query_rewrite,
            retrieval_timeout: timeouts.embedding + timeouts.vector_query,
            generation_timeout: timeouts.generation.saturating_mul(attempts) + backoff,
            rewrite_timeout: timeouts.generation,
            media_timeout: timeouts.media,
            default_pdf_path: paths.default_pdf_path.clone(),
        }
    }
}

pub struct StrategyPipeline {
    index: Arc<IndexHandle>,
    retriever: Retriever,
    generator: Arc<GenerationClient>,
    media: Arc<dyn MediaSearch>,
    prompts: PromptBuilder,
    options: PipelineOptions,
}

impl StrategyPipeline {
    pub fn new(
        index: Arc<IndexHandle>,
        generator: Arc<GenerationClient>,
        media: Arc<dyn MediaSearch>,
        prompts: PromptBuilder,
        options: PipelineOptions,
    ) -> Self {
        Self {
            retriever: Retriever::new(index.clone(), options.top_k),
            index,
            generator,
            media,
            prompts,
            options,
        }
    }

    /// Strategies for a classroom request. Always returns a usable result.
    pub async fn generate(&self, request: &StrategyRequest) -> GenerationResult {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "strategy_request",
            %request_id,
            grade = %request.grade,
            subject = %request.subject,
            time_left = request.time_left_minutes,
        );
        async move {
            let (answer, videos) = tokio::join!(self.answer(request), self.enrich(request));
            let (strategies, gated, offline) = answer;

            info!(
                strategies = strategies.len(),
                videos = videos.len(),
                ncf_used = gated.ncf_used(),
                confidence = gated.confidence_score,
                offline,
                "Strategy request completed"
            );

            GenerationResult {
                ncf_used: gated.ncf_used(),
                strategies,
                sources_used: gated.sources_used,
                confidence_score: gated.confidence_score,
                videos,
                offline_available: offline,
            }
        }
        .instrument(span)
        .await
    }

    async fn answer(&self, request: &StrategyRequest) -> (Vec<Strategy>, GatedContext, bool) {
        let retrieved = degrade(
            "retrieval",
            self.options.retrieval_timeout,
            self.retriever
                .retrieve_for(&request.grade, &request.subject, &request.query),
        )
        .await;
        let gated = gate(retrieved.value, self.options.relevance_threshold);
        let context = format_context(&gated.included, self.options.max_context_tokens);

        let ctx = StrategyContext {
            grade: &request.grade,
            subject: &request.subject,
            query: &request.query,
            time_left_minutes: request.time_left_minutes,
            language: request.language,
            class_size: request.class_size,
            teacher_name: request.teacher_name.as_deref(),
            extra_context: request.extra_context.as_deref(),
            ncf_context: &context,
        };
        let prompt = self.prompts.for_request(&ctx);

        let generated = degrade(
            "generation",
            self.options.generation_timeout,
            self.generator.generate_strategies(&prompt),
        )
        .await;

        if generated.value.is_empty() {
            if !generated.degraded {
                warn!("Model returned no strategies; using fallback catalog");
            }
            (fallback::fallback_for(&request.query), gated, true)
        } else {
            (generated.value, gated, false)
        }
    }

    async fn enrich(&self, request: &StrategyRequest) -> Vec<VideoResult> {
        if !self.options.media_enabled {
            return Vec::new();
        }
        let query = self.media_query(&request.query, &request.subject).await;
        let first = self.videos_for(&query).await;
        if !first.degraded && !first.value.is_empty() {
            return first.value;
        }

        let retry = format!("{} teaching tips", request.subject.trim());
        self.videos_for(retry.trim()).await.value
    }

    async fn videos_for(&self, query: &str) -> StageOutcome<Vec<VideoResult>> {
        degrade(
            "video_search",
            self.options.media_timeout,
            self.media.search_videos(query, self.options.video_limit),
        )
        .await
    }

    /// Search phrase for supplementary videos: a model rewrite when enabled,
    /// otherwise the subject plus the start of the question.
    async fn media_query(&self, question: &str, subject: &str) -> String {
        let heuristic = heuristic_media_query(question, subject);
        if !self.options.llm_query_rewrite || !self.generator.is_configured() {
            return heuristic;
        }

        let prompt = self.prompts.media_query_prompt(question);
        let rewritten = degrade_with(
            "media_query_rewrite",
            self.options.rewrite_timeout,
            self.generator.complete_text(&prompt),
            || heuristic.clone(),
        )
        .await
        .value;
        let cleaned = rewritten.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if cleaned.is_empty() {
            heuristic
        } else {
            cleaned.to_string()
        }
    }

    /// Step-by-step solution for a student problem.
    pub async fn solve(&self, request: &SolveRequest) -> SolveResponse {
        let prompt = self.prompts.solve_prompt(&SolveContext {
            problem_text: &request.text,
            grade: &request.grade,
            subject: &request.subject,
            language: request.language,
        });

        let outcome = tokio::time::timeout(
            self.options.generation_timeout,
            self.generator.generate_solution(&prompt),
        )
        .await;
        match outcome {
            Ok(Ok(solution)) => SolveResponse {
                success: true,
                data: solution,
                error: None,
            },
            Ok(Err(err)) => {
                warn!(kind = err.kind(), error = %err, "Solve failed");
                SolveResponse::failed(err.to_string())
            }
            Err(_) => {
                warn!("Solve timed out");
                SolveResponse::failed("generation timed out".to_string())
            }
        }
    }

    pub async fn index(
        &self,
        pdf_path: Option<&Path>,
        force: bool,
    ) -> Result<IndexReport, RagError> {
        let path = pdf_path.unwrap_or(&self.options.default_pdf_path);
        info!(path = %path.display(), force, "Indexing requested");
        let index = self.index.get().await?;
        index.index_pdf(path, force).await
    }

    pub async fn stats(&self) -> Result<IndexStats, RagError> {
        self.index.get().await?.stats().await
    }

    /// Videos for `query`; empty on any failure.
    pub async fn search_videos(&self, query: &str, limit: usize) -> Vec<VideoResult> {
        degrade(
            "video_search",
            self.options.media_timeout,
            self.media.search_videos(query, limit),
        )
        .await
        .value
    }

    /// Videos followed by web PDFs for `query`; either half is empty on failure.
    pub async fn unified_search(&self, query: &str) -> Vec<UnifiedResult> {
        let (videos, documents) = tokio::join!(
            self.search_videos(query, self.options.video_limit),
            degrade(
                "document_search",
                self.options.media_timeout,
                self.media.search_documents(query, self.options.document_limit),
            )
        );

        videos
            .into_iter()
            .map(UnifiedResult::Video)
            .chain(
                documents
                    .value
                    .into_iter()
                    .map(|doc| UnifiedResult::Pdf(doc.into())),
            )
            .collect()
    }

    pub fn generation_configured(&self) -> bool {
        self.generator.is_configured()
    }
}

fn heuristic_media_query(question: &str, subject: &str) -> String {
    let head: String = question.trim().chars().take(MEDIA_QUERY_CHARS).collect();
    format!("{} teaching {}", subject.trim(), head.trim())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::testing::{strategies_json, ScriptedProvider};
    use crate::llm::{LlmProvider, RetryPolicy};
    use crate::rag::chunker::{ChunkUnit, Chunker, Document};
    use crate::rag::embedder::testing::LetterEmbedder;
    use crate::rag::index::{IndexTimeouts, VectorIndex};
    use crate::rag::memory::MemoryVectorStore;
    use crate::rag::DistanceMetric;
    use crate::tools::media::testing::{video, StaticMediaSearch};

    fn options() -> PipelineOptions {
        PipelineOptions {
            top_k: 5,
            max_context_tokens: 2000,
            relevance_threshold: 0.3,
            media_enabled: true,
            video_limit: 3,
            document_limit: 3,
            llm_query_rewrite: false,
            retrieval_timeout: Duration::from_secs(5),
            generation_timeout: Duration::from_secs(120),
            rewrite_timeout: Duration::from_secs(5),
            media_timeout: Duration::from_secs(5),
            default_pdf_path: PathBuf::from("/nonexistent/ncf.pdf"),
        }
    }

    fn index() -> Arc<VectorIndex> {
        Arc::new(VectorIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(LetterEmbedder::new("letters")),
            Chunker::new(200, 20, ChunkUnit::Chars).unwrap(),
            "ncf_documents",
            DistanceMetric::Cosine,
            IndexTimeouts {
                embedding: Duration::from_secs(1),
                vector_query: Duration::from_secs(1),
            },
        ))
    }

    fn generator(provider: Option<Arc<ScriptedProvider>>) -> Arc<GenerationClient> {
        Arc::new(GenerationClient::new(
            provider.map(|p| p as Arc<dyn LlmProvider>),
            RetryPolicy::default(),
            Duration::from_secs(10),
            1500,
        ))
    }

    fn pipeline(
        index: Arc<VectorIndex>,
        generator: Arc<GenerationClient>,
        media: Arc<StaticMediaSearch>,
        options: PipelineOptions,
    ) -> StrategyPipeline {
        StrategyPipeline::new(
            Arc::new(IndexHandle::ready(index)),
            generator,
            media,
            PromptBuilder::default(),
            options,
        )
    }

    fn request(query: &str) -> StrategyRequest {
        StrategyRequest {
            query: query.to_string(),
            grade: "4".to_string(),
            subject: "Math".to_string(),
            class_size: Some(40),
            time_left_minutes: 15,
            language: Language::Hinglish,
            teacher_name: None,
            extra_context: None,
        }
    }

    #[tokio::test]
    async fn unconfigured_generation_with_empty_index_serves_fallback() {
        let pipeline = pipeline(
            index(),
            generator(None),
            Arc::new(StaticMediaSearch::default()),
            options(),
        );

        let result = pipeline.generate(&request("bachche fractions nahi samajh rahe")).await;

        assert_eq!(result.strategies.len(), 3);
        assert_eq!(result.strategies[0].title, "Roti Division Method");
        assert!(!result.ncf_used);
        assert_eq!(result.confidence_score, 0.0);
        assert!(result.sources_used.is_empty());
        assert!(result.offline_available);
    }

    #[tokio::test]
    async fn broken_index_still_generates_without_context() {
        let broken = IndexHandle::lazy(|| {
            Box::pin(async {
                Err::<Arc<VectorIndex>, _>(RagError::Store("database is locked".to_string()))
            })
        });
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(strategies_json(3))]));
        let pipeline = StrategyPipeline::new(
            Arc::new(broken),
            generator(Some(provider.clone())),
            Arc::new(StaticMediaSearch::default()),
            PromptBuilder::default(),
            options(),
        );

        let result = pipeline.generate(&request("class is too noisy")).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.strategies.len(), 3);
        assert!(!result.offline_available);
        assert!(!result.ncf_used);
        assert_eq!(result.confidence_score, 0.0);
        assert!(result.sources_used.is_empty());
    }

    #[tokio::test]
    async fn generated_strategies_carry_retrieval_metadata_and_videos() {
        let index = index();
        index
            .index_pages(
                vec![Document::new(
                    "ncf.pdf",
                    3,
                    "Teach fractions with concrete objects like roti before symbols.",
                )],
                "ncf.pdf",
                false,
            )
            .await
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(strategies_json(3))]));
        let media = Arc::new(StaticMediaSearch::with_videos(vec![
            video("aaaaaaaaaaa"),
            video("bbbbbbbbbbb"),
        ]));
        let pipeline = pipeline(index, generator(Some(provider.clone())), media, options());

        let result = pipeline.generate(&request("fractions roti")).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.strategies.len(), 3);
        assert_eq!(result.strategies[0].title, "Strategy 1");
        assert!(!result.offline_available);
        assert!(result.ncf_used);
        assert_eq!(result.sources_used, vec!["ncf.pdf, Page 3"]);
        assert!(result.confidence_score > 0.3 && result.confidence_score <= 1.0);
        assert_eq!(result.videos.len(), 2);
    }

    #[tokio::test]
    async fn malformed_generation_falls_back_to_catalog() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("not json at all".to_string())]));
        let pipeline = pipeline(
            index(),
            generator(Some(provider)),
            Arc::new(StaticMediaSearch::default()),
            options(),
        );

        let result = pipeline.generate(&request("class is full of noise")).await;
        assert!(result.offline_available);
        assert_eq!(result.strategies[0].title, "Clap Pattern Game");
    }

    #[tokio::test]
    async fn failed_video_search_retries_generic_query_then_degrades() {
        let media = Arc::new(StaticMediaSearch::failing());
        let pipeline = pipeline(index(), generator(None), media.clone(), options());

        let result = pipeline.generate(&request("bachche fractions nahi samajh rahe")).await;

        assert!(result.videos.is_empty());
        assert_eq!(result.strategies.len(), 3);
        assert_eq!(
            media.seen_queries(),
            vec!["Math teaching bachche fractions nahi samajh", "Math teaching tips"]
        );
    }

    #[tokio::test]
    async fn disabled_media_skips_search() {
        let media = Arc::new(StaticMediaSearch::with_videos(vec![video("aaaaaaaaaaa")]));
        let mut opts = options();
        opts.media_enabled = false;
        let pipeline = pipeline(index(), generator(None), media.clone(), opts);

        let result = pipeline.generate(&request("noise")).await;
        assert!(result.videos.is_empty());
        assert_eq!(media.video_calls(), 0);
    }

    #[tokio::test]
    async fn llm_rewrite_is_used_for_media_query() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("\"fractions roti activity\"".to_string()),
            Ok(strategies_json(3)),
        ]));
        let media = Arc::new(StaticMediaSearch::with_videos(vec![video("aaaaaaaaaaa")]));
        let mut opts = options();
        opts.llm_query_rewrite = true;
        let pipeline = pipeline(index(), generator(Some(provider)), media.clone(), opts);

        let query = pipeline.media_query("bachche fractions nahi samajh rahe", "Math").await;
        assert_eq!(query, "fractions roti activity");
    }

    #[tokio::test]
    async fn solve_success_and_failure_shapes() {
        let solution = serde_json::json!({
            "solution_markdown": "x = 2",
            "steps": [{ "title": "Subtract", "content": "2x = 4" }],
            "concept_explanation": "Linear equations",
            "difficulty_level": "Easy",
            "detected_subject": "Mathematics"
        });
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(solution.to_string())]));
        let pipeline = pipeline(
            index(),
            generator(Some(provider)),
            Arc::new(StaticMediaSearch::default()),
            options(),
        );
        let request = SolveRequest {
            text: "2x + 3 = 7".to_string(),
            grade: "8".to_string(),
            subject: "Math".to_string(),
            language: Language::En,
        };

        let solved = pipeline.solve(&request).await;
        assert!(solved.success);
        assert_eq!(solved.data.detected_subject, "Mathematics");

        let offline = StrategyPipeline::new(
            Arc::new(IndexHandle::ready(index())),
            generator(None),
            Arc::new(StaticMediaSearch::default()),
            PromptBuilder::default(),
            options(),
        );
        let failed = offline.solve(&request).await;
        assert!(!failed.success);
        assert!(failed.data.solution_markdown.starts_with("**Error generating solution:**"));
        assert_eq!(failed.data.difficulty_level, "Unknown");
        assert!(failed.data.steps.is_empty());
    }

    #[tokio::test]
    async fn unified_search_lists_videos_before_pdfs() {
        let mut media = StaticMediaSearch::with_videos(vec![video("aaaaaaaaaaa")]);
        media.documents.push(SearchResult {
            title: "NCF".to_string(),
            url: "https://a.example/ncf.pdf".to_string(),
            snippet: "framework".to_string(),
            source: "DuckDuckGo Search",
        });
        let media = Arc::new(media);
        let pipeline = pipeline(index(), generator(None), media, options());

        let results = pipeline.unified_search("ncf").await;
        let value = serde_json::to_value(&results).unwrap();
        assert_eq!(value[0]["type"], "video");
        assert_eq!(value[0]["id"], "aaaaaaaaaaa");
        assert_eq!(value[1]["type"], "pdf");
        assert_eq!(value[1]["subtitle"], "DuckDuckGo Search");
    }

    #[tokio::test]
    async fn indexing_missing_pdf_is_an_error() {
        let pipeline = pipeline(
            index(),
            generator(None),
            Arc::new(StaticMediaSearch::default()),
            options(),
        );
        let err = pipeline.index(None, false).await.unwrap_err();
        assert!(matches!(err, RagError::SourceNotFound(_)));
    }

    #[test]
    fn request_validation_bounds() {
        let mut req = request("noise");
        assert!(req.validate().is_ok());
        req.time_left_minutes = 0;
        assert!(req.validate().is_err());
        req.time_left_minutes = 60;
        req.query = "x".repeat(501);
        assert!(req.validate().is_err());
        req.query = "   ".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn heuristic_query_truncates_question() {
        assert_eq!(
            heuristic_media_query("bachche fractions nahi samajh rahe", "Math"),
            "Math teaching bachche fractions nahi samajh"
        );
        assert_eq!(heuristic_media_query("noise", ""), "teaching noise");
    }
}

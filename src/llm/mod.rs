pub mod client;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod provider;
pub mod schema;
pub mod types;

pub use client::{GenerationClient, ParsedResult, RetryPolicy};
pub use error::GenerationError;
pub use provider::{LlmProvider, ProviderError};
pub use schema::{Difficulty, SchemaKind, Solution, SolutionStep, Strategy};
pub use types::{GenerationRequest, Prompt};

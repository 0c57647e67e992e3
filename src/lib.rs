pub mod core;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;
pub mod vector_math;

pub mod answer;
pub mod error;
pub mod llm_config;
pub mod semantic_metadata;

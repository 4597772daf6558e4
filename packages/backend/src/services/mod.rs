pub mod access;
pub mod generator;
pub mod llm_provider;
pub mod prompts;
pub mod records;

pub mod code_runner;
pub mod llm_provider;

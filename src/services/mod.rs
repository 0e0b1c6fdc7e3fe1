pub mod gateway;
pub mod llm_service;

pub use gateway::{SearchGateway, SearchState, SemanticGateway, SummarizationGateway};
pub use llm_service::LlmService;

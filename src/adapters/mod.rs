pub mod anthropic;
pub mod llm;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAIClient;

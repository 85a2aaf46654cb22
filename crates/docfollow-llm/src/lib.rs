pub mod azure_openai;
pub mod config;
pub mod openai;
pub mod traits;
pub mod types;

pub use azure_openai::AzureOpenAIClient;
pub use config::{AzureConfig, ClientFactory, OpenAIConfig, ProviderConfig, ProviderType};
pub use openai::OpenAIClient;
pub use traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, ResponseFormat, TokenUsage};
pub use types::{Content, Message};

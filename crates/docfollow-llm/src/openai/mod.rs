mod client;

pub use client::OpenAIClient;
pub(crate) use client::{build_chat_payload, parse_completion, WireCompletion};

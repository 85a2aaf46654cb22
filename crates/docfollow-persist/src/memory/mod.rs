mod client;
mod jobs;

pub use client::InMemoryPersistenceClient;
pub use jobs::InMemoryJobStore;

pub(crate) use client::EXTRACTED_TEXT_SEPARATOR;

mod content;
mod message;

pub use content::Content;
pub use message::Message;

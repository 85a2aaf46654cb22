pub mod error;
pub mod inbound;
pub mod media;
pub mod messaging;

pub use error::{GatewayError, Result};
pub use inbound::{InboundMessage, MediaItem};
pub use media::{
    resolve_content_type, ExtractedMedia, HttpMediaExtractor, MediaExtractor, MediaExtractorConfig,
    MediaKind,
};
pub use messaging::{whatsapp_address, MessagingGateway, SentMessage, TwilioConfig, TwilioGateway};

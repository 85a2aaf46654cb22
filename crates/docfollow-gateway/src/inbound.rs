use docfollow_types::normalize_phone;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One media attachment on an inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub content_type: String,
}

/// Parsed inbound WhatsApp webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender number without the channel prefix
    pub from: String,
    pub body: String,
    /// Gateway message id, used as the dedup key
    pub message_sid: Option<String>,
    pub media: Vec<MediaItem>,
}

impl InboundMessage {
    /// Build from Twilio's form-encoded webhook fields.
    ///
    /// Returns `None` when there is no sender. `NumMedia` bounds the
    /// `MediaUrl{i}` / `MediaContentType{i}` pairs read.
    pub fn from_twilio_form(form: &HashMap<String, String>) -> Option<Self> {
        let from = form
            .get("From")
            .map(|f| normalize_phone(f))
            .filter(|f| !f.is_empty())?;

        let body = form.get("Body").map(|b| b.trim().to_string()).unwrap_or_default();
        let message_sid = form
            .get("MessageSid")
            .or_else(|| form.get("SmsMessageSid"))
            .filter(|s| !s.is_empty())
            .cloned();

        let num_media = form
            .get("NumMedia")
            .and_then(|n| n.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let media = (0..num_media)
            .filter_map(|i| {
                let url = form.get(&format!("MediaUrl{}", i))?;
                let content_type = form
                    .get(&format!("MediaContentType{}", i))
                    .cloned()
                    .unwrap_or_default();
                Some(MediaItem {
                    url: url.clone(),
                    content_type,
                })
            })
            .collect();

        Some(Self {
            from,
            body,
            message_sid,
            media,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.media.is_empty()
    }

    pub fn media_urls(&self) -> Vec<String> {
        self.media.iter().map(|m| m.url.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parses_text_and_media() {
        let msg = InboundMessage::from_twilio_form(&form(&[
            ("From", "whatsapp:+15550001"),
            ("Body", " fasting 110 "),
            ("MessageSid", "SM1"),
            ("NumMedia", "2"),
            ("MediaUrl0", "https://media/0"),
            ("MediaContentType0", "image/jpeg"),
            ("MediaUrl1", "https://media/1"),
            ("MediaContentType1", "application/pdf"),
        ]))
        .unwrap();

        assert_eq!(msg.from, "+15550001");
        assert_eq!(msg.body, "fasting 110");
        assert_eq!(msg.message_sid.as_deref(), Some("SM1"));
        assert_eq!(msg.media.len(), 2);
        assert_eq!(msg.media[1].content_type, "application/pdf");
    }

    #[test]
    fn test_missing_sender_is_none() {
        assert!(InboundMessage::from_twilio_form(&form(&[("Body", "hi")])).is_none());
    }

    #[test]
    fn test_num_media_bounds_pairs() {
        let msg = InboundMessage::from_twilio_form(&form(&[
            ("From", "+15550001"),
            ("NumMedia", "0"),
            ("MediaUrl0", "https://media/0"),
        ]))
        .unwrap();

        assert!(msg.media.is_empty());
        assert!(msg.is_empty());
    }
}

use serde::{Deserialize, Serialize};

use crate::models::{destination::Destination, notification::Card};

pub const THUMBNAIL_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.thumbnail";

const MESSAGE_ACTIVITY_TYPE: &str = "message";
const LOCALE: &str = "en-Us";

/// A message activity posted to the conversation connector.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub channel_id: String,
    pub conversation: ConversationAccount,
    pub locale: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content: ThumbnailCard,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailCard {
    pub title: String,
    pub text: String,
}

impl OutboundActivity {
    /// A card notification addressed to the registered destination.
    pub fn card_message(destination: &Destination, card: &Card) -> Self {
        Self {
            activity_type: MESSAGE_ACTIVITY_TYPE.to_string(),
            channel_id: destination.channel_id.clone(),
            conversation: ConversationAccount {
                id: destination.conversation_id.clone(),
            },
            locale: LOCALE.to_string(),
            text: None,
            reply_to_id: None,
            attachments: vec![Attachment {
                content_type: THUMBNAIL_CARD_CONTENT_TYPE.to_string(),
                content: ThumbnailCard {
                    title: card.title.clone(),
                    text: card.text.clone(),
                },
            }],
        }
    }

    /// A plain-text reply to an inbound activity on its own conversation.
    pub fn text_reply(inbound: &InboundActivity, text: &str) -> Self {
        Self {
            activity_type: MESSAGE_ACTIVITY_TYPE.to_string(),
            channel_id: inbound.channel_id.clone(),
            conversation: ConversationAccount {
                id: inbound.conversation.id.clone(),
            },
            locale: LOCALE.to_string(),
            text: Some(text.to_string()),
            reply_to_id: inbound.id.clone(),
            attachments: Vec::new(),
        }
    }
}

/// The subset of an inbound conversational activity the service needs:
/// enough to identify the conversation and to reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundActivity {
    #[serde(rename = "type")]
    pub activity_type: String,

    #[serde(default)]
    pub id: Option<String>,

    pub channel_id: String,
    pub service_url: String,
    pub conversation: ConversationAccount,
}

impl InboundActivity {
    pub fn destination(&self) -> Destination {
        Destination {
            conversation_id: self.conversation.id.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }
}

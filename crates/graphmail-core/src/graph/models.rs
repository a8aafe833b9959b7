//! Data models for Graph API resources and their terminal projections.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder shown for users without a `mail` attribute.
pub const NO_EMAIL: &str = "NO EMAIL";

/// An OData collection response (`{"value": [...], "@odata.nextLink": "..."}`).
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Continuation link when more results exist.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// A directory user as returned by `GET /users`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Object ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Primary SMTP address.
    #[serde(default)]
    pub mail: Option<String>,
}

/// A mail message resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Sender.
    #[serde(default)]
    pub from: Option<Recipient>,
    /// Whether the message has been read.
    #[serde(default)]
    pub is_read: Option<bool>,
    /// Time the message arrived, in UTC.
    #[serde(default)]
    pub received_date_time: Option<DateTime<Utc>>,
}

/// A message recipient or sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Address details.
    pub email_address: EmailAddress,
}

/// Name and address of a mailbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// SMTP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Graph error envelope (`{"error": {"code": "...", "message": "..."}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error code and message returned by Graph.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// A user reduced to what the menu shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    /// Object ID used for mailbox calls.
    pub id: String,
    /// Display name (empty when unset).
    pub display_name: String,
    /// Mail address or [`NO_EMAIL`].
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        let email = user
            .mail
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| NO_EMAIL.to_string());
        Self {
            id: user.id,
            display_name: user.display_name.unwrap_or_default(),
            email,
        }
    }
}

/// A message reduced to what the inbox listing shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    /// Subject line (empty when unset).
    pub subject: String,
    /// Sender display name, falling back to the sender address.
    pub sender_display_name: Option<String>,
    /// Read flag, when returned.
    pub is_read: Option<bool>,
    /// Arrival time in the local time zone.
    pub received_at: Option<DateTime<Local>>,
}

impl MessageSummary {
    /// Read status label: `Read`, `Unread`, or `Unknown`.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self.is_read {
            Some(true) => "Read",
            Some(false) => "Unread",
            None => "Unknown",
        }
    }
}

impl From<Message> for MessageSummary {
    fn from(message: Message) -> Self {
        let sender_display_name = message.from.and_then(|from| {
            let EmailAddress { name, address } = from.email_address;
            name.filter(|n| !n.is_empty()).or(address)
        });
        Self {
            subject: message.subject.unwrap_or_default(),
            sender_display_name,
            is_read: message.is_read,
            received_at: message
                .received_date_time
                .map(|t| t.with_timezone(&Local)),
        }
    }
}

/// One page of messages plus the continuation link, which is never followed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessagePage {
    /// Messages on this page.
    pub messages: Vec<MessageSummary>,
    /// `@odata.nextLink`, when the server reports more results.
    pub next_link: Option<String>,
}

impl MessagePage {
    /// Whether the server reported further pages.
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.next_link.is_some()
    }
}

/// A plain-text mail composed in the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Single "to" recipient address.
    pub recipient: String,
}

impl OutgoingMessage {
    /// Create a message with a single recipient.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            recipient: recipient.into(),
        }
    }

    /// Build the `POST /users/{id}/sendMail` request body.
    #[must_use]
    pub fn to_request(&self) -> SendMailRequest<'_> {
        SendMailRequest {
            message: OutgoingPayload {
                subject: &self.subject,
                body: ItemBody {
                    content_type: "text",
                    content: &self.body,
                },
                to_recipients: vec![Recipient {
                    email_address: EmailAddress {
                        name: None,
                        address: Some(self.recipient.clone()),
                    },
                }],
            },
        }
    }
}

/// Request body for `sendMail`.
#[derive(Debug, Serialize)]
pub struct SendMailRequest<'a> {
    message: OutgoingPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingPayload<'a> {
    subject: &'a str,
    body: ItemBody<'a>,
    to_recipients: Vec<Recipient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

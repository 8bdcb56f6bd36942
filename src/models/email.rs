use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Sender or recipient address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

/// One address or several; always sent to SendGrid as a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Recipients::One(email) => vec![email],
            Recipients::Many(emails) => emails,
        }
    }
}

impl From<&str> for Recipients {
    fn from(email: &str) -> Self {
        Recipients::One(email.to_string())
    }
}

impl From<String> for Recipients {
    fn from(email: String) -> Self {
        Recipients::One(email)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(emails: Vec<String>) -> Self {
        Recipients::Many(emails)
    }
}

/// Attachment forwarded to SendGrid as-is (`content` is base64)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub content: String,
    pub filename: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Message handed to `SendGridClient::send_mail`.
///
/// When a template id ends up set, `content`/`content_type` are ignored and
/// the template renders the body.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: Recipients,
    pub subject: String,
    pub content: String,
    pub content_type: String,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub template_id: Option<String>,
    pub dynamic_template_data: Option<Map<String, Value>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl EmailMessage {
    pub fn new(
        to: impl Into<Recipients>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            content: content.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            from_email: None,
            from_name: None,
            template_id: None,
            dynamic_template_data: None,
            attachments: None,
        }
    }

    pub fn with_sender(mut self, email: Option<String>, name: Option<String>) -> Self {
        self.from_email = email;
        self.from_name = name;
        self
    }

    pub fn with_template(mut self, template_id: Option<String>, data: Map<String, Value>) -> Self {
        self.template_id = template_id;
        self.dynamic_template_data = Some(data);
        self
    }
}

/// Body of `POST /mail/send`
#[derive(Debug, Clone, Serialize)]
pub struct MailSendRequest {
    pub personalizations: Vec<Personalization>,
    pub from: EmailAddress,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Content>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Personalization {
    pub to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_template_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: String,
    pub value: String,
}

/// Outcome of a successful send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub message_id: Option<String>,
    pub to_emails: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_normalize_to_list() {
        assert_eq!(Recipients::from("a@x.com").into_vec(), vec!["a@x.com"]);
        assert_eq!(
            Recipients::from(vec!["a@x.com".to_string(), "b@x.com".to_string()]).into_vec(),
            vec!["a@x.com", "b@x.com"]
        );
    }

    #[test]
    fn test_recipients_deserialize_either_shape() {
        let one: Recipients = serde_json::from_str(r#""a@x.com""#).unwrap();
        assert_eq!(one, Recipients::One("a@x.com".to_string()));

        let many: Recipients = serde_json::from_str(r#"["a@x.com","b@x.com"]"#).unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn test_attachment_type_field_name() {
        let attachment = Attachment {
            content: "aGVsbG8=".to_string(),
            filename: "hello.txt".to_string(),
            mime_type: Some("text/plain".to_string()),
            disposition: None,
            content_id: None,
        };

        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["type"], "text/plain");
        assert!(json.get("disposition").is_none());
    }

    #[test]
    fn test_new_message_defaults_to_html() {
        let message = EmailMessage::new("a@x.com", "Hi", "<p>body</p>");
        assert_eq!(message.content_type, "text/html");
        assert!(message.template_id.is_none());
        assert!(message.dynamic_template_data.is_none());
    }
}

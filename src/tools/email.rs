use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::email::DEFAULT_CONTENT_TYPE;
use crate::models::{Attachment, EmailMessage, SendResult};
use crate::sendgrid::SendGridClient;
use crate::state::AppState;
use crate::tools::{split_comma_list, ToolContext};

const DEFAULT_TEMPLATE_SUBJECT: &str = "Email from Template";

#[derive(Debug, Deserialize)]
pub struct SendEmailArgs {
    pub to_emails: String,
    pub subject: String,
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

#[derive(Debug, Deserialize)]
pub struct SendTemplateEmailArgs {
    pub to_emails: String,
    pub dynamic_template_data: Map<String, Value>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetTemplateInfoArgs {
    #[serde(default)]
    pub template_id: Option<String>,
}

/// send_email: literal text/HTML content
pub async fn send_email(
    state: &AppState,
    ctx: &ToolContext,
    args: SendEmailArgs,
) -> Result<SendResult> {
    let run = async {
        let to_emails = split_comma_list(&args.to_emails);
        ctx.info(format!("Sending email to {} recipient(s)", to_emails.len()));

        let client = SendGridClient::from_state(state, ctx.credential())?;
        let mut message = EmailMessage::new(to_emails, args.subject, args.content)
            .with_sender(args.from_email, args.from_name);
        message.content_type = args.content_type;
        message.attachments = args.attachments;

        let result = client.send_mail(message).await?;
        ctx.info("Email sent successfully");
        Ok::<_, AppError>(result)
    };

    run.await.map_err(|e| ctx.fail("Failed to send email", e))
}

/// send_template_email: body rendered by a SendGrid dynamic template
pub async fn send_template_email(
    state: &AppState,
    ctx: &ToolContext,
    args: SendTemplateEmailArgs,
) -> Result<SendResult> {
    let run = async {
        let template_id = require_template_id(state, args.template_id)?;

        let to_emails = split_comma_list(&args.to_emails);
        ctx.info(format!(
            "Sending template email to {} recipient(s)",
            to_emails.len()
        ));
        ctx.info(format!("Using template ID: {}", template_id));

        let client = SendGridClient::from_state(state, ctx.credential())?;
        let subject = args
            .subject
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TEMPLATE_SUBJECT.to_string());
        let message = EmailMessage::new(to_emails, subject, "")
            .with_sender(args.from_email, args.from_name)
            .with_template(Some(template_id), args.dynamic_template_data);

        let result = client.send_mail(message).await?;
        ctx.info("Template email sent successfully");
        Ok::<_, AppError>(result)
    };

    run.await.map_err(|e| ctx.fail("Failed to send template email", e))
}

/// get_template_info: raw template JSON, for the agent to inspect
pub async fn get_template_info(
    state: &AppState,
    ctx: &ToolContext,
    args: GetTemplateInfoArgs,
) -> Result<Value> {
    let run = async {
        let template_id = require_template_id(state, args.template_id)?;
        ctx.info(format!(
            "Fetching template information for ID: {}",
            template_id
        ));

        let endpoint = template_endpoint(&template_id)?;
        let client = SendGridClient::from_state(state, ctx.credential())?;
        let template = client
            .raw_request(Method::GET, &endpoint, None, None)
            .await?;

        ctx.info("Template information retrieved successfully");
        Ok::<_, AppError>(template)
    };

    run.await.map_err(|e| ctx.fail("Failed to get template info", e))
}

fn require_template_id(state: &AppState, template_id: Option<String>) -> Result<String> {
    template_id
        .filter(|t| !t.is_empty())
        .or_else(|| state.config.default_template_id.clone())
        .ok_or_else(|| {
            AppError::Validation(
                "Template ID is required but none was provided or found in config".to_string(),
            )
        })
}

/// `templates/{id}`, refusing ids that would escape the single path segment
fn template_endpoint(template_id: &str) -> Result<String> {
    let escapes_segment = template_id == "."
        || template_id == ".."
        || template_id.contains(['/', '\\', '?', '#', '%']);
    if escapes_segment {
        return Err(AppError::Validation(format!(
            "Invalid template ID: {}",
            template_id
        )));
    }
    Ok(format!("templates/{}", template_id))
}

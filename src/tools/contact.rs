use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{Contact, UpsertContactsRequest};
use crate::sendgrid::SendGridClient;
use crate::state::AppState;
use crate::tools::{split_comma_list, ToolContext};

const CONTACTS_ENDPOINT: &str = "/marketing/contacts";
const LISTS_ENDPOINT: &str = "/marketing/lists";

/// Custom fields arrive either as a JSON object or as a JSON-encoded string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CustomFields {
    Object(Map<String, Value>),
    Text(String),
}

impl CustomFields {
    pub fn into_map(self) -> Result<Map<String, Value>> {
        match self {
            CustomFields::Object(map) => Ok(map),
            CustomFields::Text(text) if text.is_empty() => Ok(Map::new()),
            CustomFields::Text(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(AppError::Validation(
                    "custom_fields must be a JSON object".to_string(),
                )),
                Err(e) => Err(AppError::Validation(format!(
                    "Invalid JSON in custom_fields: {}",
                    e
                ))),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddContactArgs {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<CustomFields>,
    #[serde(default)]
    pub list_ids: Option<String>,
}

impl AddContactArgs {
    /// Build the upsert payload; custom fields may override named fields
    pub fn into_request(self) -> Result<UpsertContactsRequest> {
        let custom_fields = match self.custom_fields {
            Some(fields) => fields.into_map()?,
            None => Map::new(),
        };

        let contact = Contact {
            email: self.email,
            first_name: self.first_name.filter(|n| !n.is_empty()),
            last_name: self.last_name.filter(|n| !n.is_empty()),
            custom_fields,
        };

        let list_ids = self
            .list_ids
            .map(|ids| split_comma_list(&ids))
            .filter(|ids| !ids.is_empty());

        Ok(UpsertContactsRequest {
            contacts: vec![contact],
            list_ids,
        })
    }
}

/// add_contact: upsert one marketing contact
pub async fn add_contact(state: &AppState, ctx: &ToolContext, args: AddContactArgs) -> Result<Value> {
    let email = args.email.clone();

    let run = async {
        ctx.info(format!("Processing contact: {}", email));

        let request = args.into_request()?;
        if let Some(lists) = &request.list_ids {
            ctx.info(format!("Adding contact to {} list(s)", lists.len()));
        }

        ctx.info("Sending contact update request to SendGrid");
        let client = SendGridClient::from_state(state, ctx.credential())?;
        let body = serde_json::to_value(&request)?;
        let result = client
            .raw_request(Method::PUT, CONTACTS_ENDPOINT, Some(&body), None)
            .await?;

        ctx.info("Contact updated successfully");
        Ok::<_, AppError>(result)
    };

    run.await
        .map_err(|e| ctx.fail(format!("Failed to add/update contact {}", email), e))
}

/// get_contact_lists: every marketing list on the account
pub async fn get_contact_lists(state: &AppState, ctx: &ToolContext) -> Result<Value> {
    let run = async {
        ctx.info("Fetching contact lists from SendGrid");

        let client = SendGridClient::from_state(state, ctx.credential())?;
        let result = client
            .raw_request(Method::GET, LISTS_ENDPOINT, None, None)
            .await?;

        if let Some(lists) = result.get("result").and_then(Value::as_array) {
            if !lists.is_empty() {
                ctx.info(format!("Retrieved {} contact list(s)", lists.len()));
            }
        }
        Ok::<_, AppError>(result)
    };

    run.await
        .map_err(|e| ctx.fail("Failed to retrieve contact lists", e))
}

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    Content, EmailAddress, EmailMessage, MailSendRequest, Personalization, SendResult,
};
use crate::sendgrid::RateLimiter;
use crate::state::AppState;

const MAIL_SEND_ENDPOINT: &str = "mail/send";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MESSAGE_ID_HEADER: &str = "X-Message-Id";

/// Pick the API key for a call: the caller's own key if given, otherwise the
/// server default.
pub fn resolve_api_key(explicit: Option<&str>, config: &Config) -> Result<String> {
    explicit
        .filter(|key| !key.is_empty())
        .or(config.sendgrid_api_key.as_deref())
        .map(str::to_string)
        .ok_or_else(|| AppError::Configuration("SendGrid API key is required".to_string()))
}

/// SendGrid v3 client bound to a single API key
#[derive(Clone)]
pub struct SendGridClient {
    http: Client,
    api_key: String,
    config: Arc<Config>,
    rate_limiter: Arc<RateLimiter>,
}

impl SendGridClient {
    pub fn new(
        http: Client,
        config: Arc<Config>,
        rate_limiter: Arc<RateLimiter>,
        api_key: Option<&str>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(api_key, &config)?;
        Ok(Self {
            http,
            api_key,
            config,
            rate_limiter,
        })
    }

    /// Client for one tool call, using the caller's bearer token when present
    pub fn from_state(state: &AppState, credential: Option<&str>) -> Result<Self> {
        Self::new(
            state.http.clone(),
            state.config.clone(),
            state.rate_limiter.clone(),
            credential,
        )
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Apply sender/template defaults and shape the `mail/send` body.
    ///
    /// Returns the body together with the normalized recipient list.
    pub fn build_mail_request(&self, message: EmailMessage) -> Result<(MailSendRequest, Vec<String>)> {
        let from_email = message
            .from_email
            .filter(|e| !e.is_empty())
            .or_else(|| self.config.default_from_email.clone())
            .ok_or_else(|| AppError::Validation("From email is required".to_string()))?;
        let from_name = message
            .from_name
            .filter(|n| !n.is_empty())
            .or_else(|| self.config.default_from_name.clone());

        // Only fall back to the default template for template-based sends
        let template_data = message.dynamic_template_data.filter(|d| !d.is_empty());
        let mut template_id = message.template_id.filter(|t| !t.is_empty());
        if template_data.is_some() {
            template_id = template_id.or_else(|| self.config.default_template_id.clone());
            if template_id.is_none() {
                return Err(AppError::Validation(
                    "Template ID is required when using dynamic template data".to_string(),
                ));
            }
        }

        let to_emails = message.to.into_vec();
        if to_emails.is_empty() {
            return Err(AppError::Validation(
                "At least one recipient is required".to_string(),
            ));
        }

        let content = match template_id {
            Some(_) => None,
            None => Some(vec![Content {
                content_type: message.content_type,
                value: message.content,
            }]),
        };

        let request = MailSendRequest {
            personalizations: vec![Personalization {
                to: to_emails.iter().map(EmailAddress::new).collect(),
                dynamic_template_data: template_id.as_ref().and(template_data),
            }],
            from: EmailAddress {
                email: from_email,
                name: from_name,
            },
            subject: message.subject,
            content,
            template_id,
            attachments: message.attachments.filter(|a| !a.is_empty()),
        };

        Ok((request, to_emails))
    }

    /// Send a message through `POST /mail/send`
    pub async fn send_mail(&self, message: EmailMessage) -> Result<SendResult> {
        let (request, to_emails) = self.build_mail_request(message)?;

        self.rate_limiter.await_turn().await;

        let response = self
            .http
            .post(self.endpoint_url(MAIL_SEND_ENDPOINT))
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send email");
                AppError::from(e)
            })?;

        let status = response.status();
        let message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            return Err(provider_error(response, "Failed to send email").await);
        }

        tracing::info!(
            status = status.as_u16(),
            recipients = to_emails.len(),
            message_id = ?message_id,
            "Email sent"
        );

        Ok(SendResult {
            status_code: status.as_u16(),
            success: true,
            message: "Email sent successfully".to_string(),
            message_id,
            to_emails,
        })
    }

    /// Generic JSON call against the v3 REST API.
    ///
    /// An empty success body comes back as `{"status": "success", "status_code": N}`.
    pub async fn raw_request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: Option<&[(String, String)]>,
    ) -> Result<Value> {
        self.rate_limiter.await_turn().await;

        let url = self.endpoint_url(endpoint);
        tracing::debug!(method = %method, url = %url, "SendGrid API request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, url = %url, "Request failed");
            AppError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(response, "HTTP error").await);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(json!({
                "status": "success",
                "status_code": status.as_u16()
            }));
        }

        serde_json::from_slice(&bytes).map_err(|e| AppError::Provider {
            status: status.as_u16(),
            body: format!("invalid JSON in response: {}", e),
        })
    }
}

async fn provider_error(response: Response, what: &str) -> AppError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status, body = %body, "{}", what);
    AppError::Provider { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Map;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(config: Config, api_key: Option<&str>) -> SendGridClient {
        SendGridClient::new(
            Client::new(),
            Arc::new(config),
            Arc::new(RateLimiter::new(0)),
            api_key,
        )
        .expect("Should build client")
    }

    fn mock_config(server: &MockServer) -> Config {
        Config {
            api_base_url: server.uri(),
            sendgrid_api_key: Some("default-key".to_string()),
            default_from_email: Some("noreply@example.com".to_string()),
            ..Config::default()
        }
    }

    fn template_data() -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("name".to_string(), json!("Bob"));
        data
    }

    #[test]
    fn test_resolve_api_key_order() {
        let config = Config {
            sendgrid_api_key: Some("default-key".to_string()),
            ..Config::default()
        };

        assert_eq!(resolve_api_key(Some("caller-key"), &config).unwrap(), "caller-key");
        assert_eq!(resolve_api_key(None, &config).unwrap(), "default-key");
        assert_eq!(resolve_api_key(Some(""), &config).unwrap(), "default-key");
    }

    #[test]
    fn test_resolve_api_key_missing_is_configuration_error() {
        let result = resolve_api_key(None, &Config::default());
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_endpoint_url_joins_paths() {
        let client = client_for(
            Config {
                api_base_url: "https://api.sendgrid.com/v3/".to_string(),
                ..Config::default()
            },
            Some("key"),
        );

        assert_eq!(
            client.endpoint_url("/marketing/lists"),
            "https://api.sendgrid.com/v3/marketing/lists"
        );
        assert_eq!(
            client.endpoint_url("templates/d-1"),
            "https://api.sendgrid.com/v3/templates/d-1"
        );
    }

    #[test]
    fn test_literal_message_shape() {
        let client = client_for(
            Config {
                default_from_email: Some("noreply@example.com".to_string()),
                default_from_name: Some("Example".to_string()),
                ..Config::default()
            },
            Some("key"),
        );

        let message = EmailMessage::new(
            vec!["a@x.com".to_string(), "b@x.com".to_string()],
            "Hi",
            "body",
        );
        let (request, to_emails) = client.build_mail_request(message).unwrap();

        assert_eq!(to_emails, vec!["a@x.com", "b@x.com"]);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "personalizations": [{"to": [{"email": "a@x.com"}, {"email": "b@x.com"}]}],
                "from": {"email": "noreply@example.com", "name": "Example"},
                "subject": "Hi",
                "content": [{"type": "text/html", "value": "body"}]
            })
        );
    }

    #[test]
    fn test_template_takes_precedence_over_content() {
        let client = client_for(Config::default(), Some("key"));

        let message = EmailMessage::new("a@x.com", "Hi", "ignored")
            .with_sender(Some("me@x.com".to_string()), None)
            .with_template(Some("d-123".to_string()), template_data());
        let (request, _) = client.build_mail_request(message).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["template_id"], "d-123");
        assert_eq!(json["personalizations"][0]["dynamic_template_data"]["name"], "Bob");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_template_data_falls_back_to_default_template() {
        let client = client_for(
            Config {
                default_template_id: Some("d-default".to_string()),
                ..Config::default()
            },
            Some("key"),
        );

        let message = EmailMessage::new("a@x.com", "Hi", "")
            .with_sender(Some("me@x.com".to_string()), None)
            .with_template(None, template_data());
        let (request, _) = client.build_mail_request(message).unwrap();

        assert_eq!(request.template_id.as_deref(), Some("d-default"));
    }

    #[test]
    fn test_default_template_not_used_for_literal_sends() {
        let client = client_for(
            Config {
                default_template_id: Some("d-default".to_string()),
                ..Config::default()
            },
            Some("key"),
        );

        let message = EmailMessage::new("a@x.com", "Hi", "body")
            .with_sender(Some("me@x.com".to_string()), None);
        let (request, _) = client.build_mail_request(message).unwrap();

        assert!(request.template_id.is_none());
        assert!(request.content.is_some());
    }

    #[test]
    fn test_template_data_without_any_template_id_fails() {
        let client = client_for(Config::default(), Some("key"));

        let message = EmailMessage::new("a@x.com", "Hi", "")
            .with_sender(Some("me@x.com".to_string()), None)
            .with_template(None, template_data());

        assert!(matches!(
            client.build_mail_request(message),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_sender_fails() {
        let client = client_for(Config::default(), Some("key"));
        let message = EmailMessage::new("a@x.com", "Hi", "body");

        let err = client.build_mail_request(message).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: From email is required");
    }

    #[tokio::test]
    async fn test_send_mail_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mail/send"))
            .and(header("authorization", "Bearer caller-key"))
            .and(body_json(json!({
                "personalizations": [{"to": [{"email": "a@x.com"}]}],
                "from": {"email": "noreply@example.com"},
                "subject": "Hi",
                "content": [{"type": "text/plain", "value": "body"}]
            })))
            .respond_with(ResponseTemplate::new(202).insert_header("X-Message-Id", "msg-1"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(mock_config(&server), Some("caller-key"));
        let mut message = EmailMessage::new("a@x.com", "Hi", "body");
        message.content_type = "text/plain".to_string();

        let result = client.send_mail(message).await.expect("Should send");
        assert_eq!(
            result,
            SendResult {
                status_code: 202,
                success: true,
                message: "Email sent successfully".to_string(),
                message_id: Some("msg-1".to_string()),
                to_emails: vec!["a@x.com".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_send_mail_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mail/send"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"errors":[{"message":"bad key"}]}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(mock_config(&server), None);
        let err = client
            .send_mail(EmailMessage::new("a@x.com", "Hi", "body"))
            .await
            .unwrap_err();

        match err {
            AppError::Provider { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_raw_request_returns_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/marketing/lists"))
            .and(query_param("page_size", "10"))
            .and(header("authorization", "Bearer default-key"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .mount(&server)
            .await;

        let client = client_for(mock_config(&server), None);
        let query = vec![("page_size".to_string(), "10".to_string())];
        let value = client
            .raw_request(Method::GET, "/marketing/lists", None, Some(&query))
            .await
            .expect("Should succeed");

        assert_eq!(value, json!({"result": []}));
    }

    #[tokio::test]
    async fn test_raw_request_empty_body_is_synthetic_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/marketing/lists/L1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(mock_config(&server), None);
        let value = client
            .raw_request(Method::DELETE, "marketing/lists/L1", None, None)
            .await
            .expect("Should succeed");

        assert_eq!(value, json!({"status": "success", "status_code": 204}));
    }

    #[tokio::test]
    async fn test_raw_request_http_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/templates/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = client_for(mock_config(&server), None);
        let err = client
            .raw_request(Method::GET, "templates/missing", None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Provider { status: 404, ref body } if body == "not found"
        ));
    }

    #[tokio::test]
    async fn test_outbound_calls_are_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/marketing/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mail/send"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        // 10 req/s: three calls need at least two 100ms gaps
        let client = SendGridClient::new(
            Client::new(),
            Arc::new(mock_config(&server)),
            Arc::new(RateLimiter::new(10)),
            None,
        )
        .expect("Should build client");

        let start = std::time::Instant::now();
        client
            .raw_request(Method::GET, "marketing/lists", None, None)
            .await
            .expect("Should succeed");
        client
            .raw_request(Method::GET, "marketing/lists", None, None)
            .await
            .expect("Should succeed");
        client
            .send_mail(EmailMessage::new("a@x.com", "Hi", "body"))
            .await
            .expect("Should send");

        assert!(
            start.elapsed() >= Duration::from_millis(200),
            "elapsed {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_raw_request_connection_failure_is_network_error() {
        let client = client_for(
            Config {
                api_base_url: "http://127.0.0.1:1".to_string(),
                ..Config::default()
            },
            Some("key"),
        );

        let err = client
            .raw_request(Method::GET, "marketing/lists", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }
}

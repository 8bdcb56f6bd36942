use std::env;

pub const DEFAULT_API_BASE_URL: &str = "https://api.sendgrid.com/v3";

/// How the MCP server talks to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Stdio,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub transport: Transport,
    pub sendgrid_api_key: Option<String>,
    pub api_base_url: String,
    pub default_from_email: Option<String>,
    pub default_from_name: Option<String>,
    pub default_template_id: Option<String>,
    /// Max outbound SendGrid calls per second; `<= 0` disables throttling
    pub rate_limit: i64,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            transport: Transport::Http,
            sendgrid_api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_from_email: None,
            default_from_name: None,
            default_template_id: None,
            rate_limit: 10,
            debug: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            transport: parse_transport(&env::var("MCP_TRANSPORT").unwrap_or_default())?,
            sendgrid_api_key: non_empty_var("SENDGRID_API_KEY"),
            api_base_url: non_empty_var("SENDGRID_API_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            default_from_email: non_empty_var("DEFAULT_FROM_EMAIL"),
            default_from_name: non_empty_var("DEFAULT_FROM_NAME"),
            default_template_id: non_empty_var("DEFAULT_TEMPLATE_ID"),
            rate_limit: env::var("RATE_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidRateLimit)?,
            debug: parse_flag(&env::var("DEBUG").unwrap_or_default()),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_transport(value: &str) -> Result<Transport, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "" | "http" => Ok(Transport::Http),
        "stdio" => Ok(Transport::Stdio),
        other => Err(ConfigError::InvalidTransport(other.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server port")]
    InvalidPort,
    #[error("RATE_LIMIT must be an integer")]
    InvalidRateLimit,
    #[error("Unknown MCP_TRANSPORT '{0}' (expected 'http' or 'stdio')")]
    InvalidTransport(String),
}

use anyhow::{Context, Result};

const DEFAULT_STRIKE_API_URL: &str = "https://api.strike.me/v1";
const DEFAULT_RATE_API_URL: &str = "https://mempool.space/api/v1/prices";
const DEFAULT_MAILGUN_API_URL: &str = "https://api.mailgun.net/v3";
const DEFAULT_FIAT_CURRENCY: &str = "GBP";

#[derive(Clone, Debug)]
pub struct MailSettings {
    pub api_url: String,
    pub api_key: String,
    pub domain: String,
    pub receivers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub http_addr: String,
    pub admin_pin: String,
    pub strike_api_url: String,
    pub strike_api_key: String,
    pub rate_api_url: String,
    pub fiat_currency: String,
    pub redirect_url: Option<String>,
    pub mail: Option<MailSettings>,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let admin_pin = std::env::var("ADMIN_PIN").context("ADMIN_PIN is required")?;
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());
        let strike_api_url = std::env::var("STRIKE_API_URL")
            .unwrap_or_else(|_| DEFAULT_STRIKE_API_URL.to_string());
        let strike_api_key = std::env::var("STRIKE_API_KEY").unwrap_or_default();
        let rate_api_url =
            std::env::var("RATE_API_URL").unwrap_or_else(|_| DEFAULT_RATE_API_URL.to_string());
        let fiat_currency =
            std::env::var("FIAT_CURRENCY").unwrap_or_else(|_| DEFAULT_FIAT_CURRENCY.to_string());
        let redirect_url = std::env::var("REDIRECT_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            database_url,
            http_addr,
            admin_pin,
            strike_api_url,
            strike_api_key,
            rate_api_url,
            fiat_currency,
            redirect_url,
            mail: mail_from_env(),
        })
    }
}

// Mail is best-effort; missing settings disable it instead of failing boot.
fn mail_from_env() -> Option<MailSettings> {
    let api_key = std::env::var("MAILGUN_API_KEY").ok().filter(|v| !v.is_empty())?;
    let domain = std::env::var("MAILGUN_DOMAIN").ok().filter(|v| !v.is_empty())?;
    let receivers: Vec<String> = std::env::var("MAILGUN_RECEIVERS")
        .ok()?
        .split(',')
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .collect();
    if receivers.is_empty() {
        return None;
    }
    let api_url = std::env::var("MAILGUN_API_URL")
        .unwrap_or_else(|_| DEFAULT_MAILGUN_API_URL.to_string());

    Some(MailSettings {
        api_url,
        api_key,
        domain,
        receivers,
    })
}

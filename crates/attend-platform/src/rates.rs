use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::lightning::InvoiceError;

/// Client for the exchange-rate oracle. The endpoint returns a flat JSON
/// object of currency code to BTC price, e.g. `{"USD": 64000, "GBP": 50000}`.
#[derive(Clone)]
pub struct RateClient {
    client: Client,
    url: String,
    currency: String,
}

impl RateClient {
    pub fn new(client: Client, url: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            currency: currency.into(),
        }
    }

    /// Current BTC price in the configured fiat currency.
    pub async fn fiat_rate(&self) -> Result<Decimal, InvoiceError> {
        let response: Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| InvoiceError::RateUnavailable(err.to_string()))?
            .error_for_status()
            .map_err(|err| InvoiceError::RateUnavailable(err.to_string()))?
            .json()
            .await
            .map_err(|err| InvoiceError::RateUnavailable(err.to_string()))?;

        rate_field(&response, &self.currency)
    }
}

fn rate_field(body: &Value, currency: &str) -> Result<Decimal, InvoiceError> {
    let rate = body
        .get(currency)
        .and_then(Value::as_f64)
        .and_then(Decimal::from_f64_retain)
        .ok_or_else(|| {
            InvoiceError::RateUnavailable(format!("no {currency} rate in response"))
        })?;

    if rate <= Decimal::ZERO {
        return Err(InvoiceError::RateUnavailable(format!(
            "non-positive {currency} rate"
        )));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_the_configured_currency() {
        let body = json!({"USD": 64000.0, "GBP": 50000.5});
        assert_eq!(
            rate_field(&body, "GBP").unwrap(),
            Decimal::from_f64_retain(50000.5).unwrap()
        );
    }

    #[test]
    fn missing_or_bad_rate_is_an_error() {
        let body = json!({"USD": 64000.0});
        assert!(matches!(
            rate_field(&body, "GBP"),
            Err(InvoiceError::RateUnavailable(_))
        ));

        let body = json!({"GBP": "not-a-number"});
        assert!(rate_field(&body, "GBP").is_err());

        let body = json!({"GBP": 0});
        assert!(rate_field(&body, "GBP").is_err());
    }
}

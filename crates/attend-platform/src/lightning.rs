use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use attend_core::pending::SettlementCheck;

use crate::rates::RateClient;

const SETTLEMENT_CURRENCY: &str = "BTC";
const INVOICE_DESCRIPTION: &str = "Event RSVP payment";
// Satoshi precision; the processor rejects finer amounts.
const BTC_SCALE: u32 = 8;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(String),
    #[error("invoice creation failed: {0}")]
    InvoiceCreationFailed(String),
    #[error("invoice quote failed: {0}")]
    QuoteFailed(String),
}

#[derive(Debug, Clone)]
pub struct IssuedInvoice {
    pub invoice_id: String,
    pub ln_invoice: String,
    pub amount_btc: Decimal,
}

/// Client for the Strike-style invoicing API: create an invoice, request a
/// payable quote for it, and read back its settlement state.
#[derive(Clone)]
pub struct LightningClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LightningClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url.into()),
            api_key: api_key.into(),
        }
    }

    pub async fn create_invoice(&self, amount_btc: Decimal) -> Result<String, InvoiceError> {
        let body = json!({
            "amount": {
                "amount": amount_btc.to_string(),
                "currency": SETTLEMENT_CURRENCY,
            },
            "description": INVOICE_DESCRIPTION,
        });

        let response: Value = self
            .client
            .post(format!("{}/invoices", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| InvoiceError::InvoiceCreationFailed(err.to_string()))?
            .error_for_status()
            .map_err(|err| InvoiceError::InvoiceCreationFailed(err.to_string()))?
            .json()
            .await
            .map_err(|err| InvoiceError::InvoiceCreationFailed(err.to_string()))?;

        parse_invoice_response(&response)
    }

    pub async fn quote(&self, invoice_id: &str) -> Result<String, InvoiceError> {
        let response: Value = self
            .client
            .post(format!("{}/invoices/{invoice_id}/quote", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({}))
            .send()
            .await
            .map_err(|err| InvoiceError::QuoteFailed(err.to_string()))?
            .error_for_status()
            .map_err(|err| InvoiceError::QuoteFailed(err.to_string()))?
            .json()
            .await
            .map_err(|err| InvoiceError::QuoteFailed(err.to_string()))?;

        parse_quote_response(&response)
    }

    /// True iff the processor reports the invoice state as PAID. Any
    /// transport or parse failure reads as unpaid so the client keeps
    /// polling; settlement is never assumed.
    pub async fn is_paid(&self, invoice_id: &str) -> bool {
        let response = self
            .client
            .get(format!("{}/invoices/{invoice_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;

        let state = match response {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => str_field(&body, "state"),
                Err(err) => {
                    debug!("invoice {invoice_id}: unreadable state response: {err}");
                    None
                }
            },
            Err(err) => {
                debug!("invoice {invoice_id}: state request failed: {err}");
                None
            }
        };

        state.as_deref() == Some("PAID")
    }
}

#[async_trait]
impl SettlementCheck for LightningClient {
    async fn is_settled(&self, invoice_id: &str) -> bool {
        self.is_paid(invoice_id).await
    }
}

/// Full issuing flow for a priced RSVP: fiat rate, BTC conversion, invoice,
/// payable quote. Any failure aborts the whole flow; the caller must never
/// act on a partial result.
pub async fn issue_invoice(
    rates: &RateClient,
    lightning: &LightningClient,
    price: Decimal,
) -> Result<IssuedInvoice, InvoiceError> {
    let rate = rates.fiat_rate().await?;
    let amount_btc = btc_amount(price, rate)?;
    let invoice_id = lightning.create_invoice(amount_btc).await?;
    let ln_invoice = lightning.quote(&invoice_id).await?;

    Ok(IssuedInvoice {
        invoice_id,
        ln_invoice,
        amount_btc,
    })
}

fn parse_invoice_response(response: &Value) -> Result<String, InvoiceError> {
    str_field(response, "invoiceId").ok_or_else(|| {
        InvoiceError::InvoiceCreationFailed("response is missing invoiceId".to_string())
    })
}

fn parse_quote_response(response: &Value) -> Result<String, InvoiceError> {
    str_field(response, "lnInvoice")
        .ok_or_else(|| InvoiceError::QuoteFailed("response is missing lnInvoice".to_string()))
}

pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn btc_amount(price: Decimal, rate: Decimal) -> Result<Decimal, InvoiceError> {
    if rate <= Decimal::ZERO {
        return Err(InvoiceError::RateUnavailable(
            "non-positive exchange rate".to_string(),
        ));
    }
    price
        .checked_div(rate)
        .map(|amount| amount.round_dp(BTC_SCALE))
        .ok_or_else(|| InvoiceError::RateUnavailable("conversion overflow".to_string()))
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0} must be in {1} format")]
    Format(&'static str, &'static str),
    #[error("email is not a valid address")]
    Email,
    #[error("price must be a non-negative number")]
    Price,
    #[error("event id must be a positive integer")]
    EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: Decimal,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// A validated event payload, ready to insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: Decimal,
    pub location: String,
}

/// A validated RSVP, either committed straight away (free events) or parked
/// in the pending-payment store until the invoice settles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RsvpSubmission {
    pub name: String,
    pub email: String,
    pub event_id: i64,
}

impl RsvpSubmission {
    pub fn parse(name: &str, email: &str, event_id: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: non_empty(name, "name")?,
            email: validate_email(email)?,
            event_id: parse_event_id(event_id)?,
        })
    }
}

pub fn non_empty(raw: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(value.to_string())
}

pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(ValidationError::Email);
    }
    let Some((local, domain)) = value.split_once('@') else {
        return Err(ValidationError::Email);
    };
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(ValidationError::Email);
    }
    Ok(value.to_string())
}

pub fn parse_event_id(raw: &str) -> Result<i64, ValidationError> {
    let id: i64 = raw.trim().parse().map_err(|_| ValidationError::EventId)?;
    if id <= 0 {
        return Err(ValidationError::EventId);
    }
    Ok(id)
}

pub fn parse_event_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::Format("date", "YYYY-MM-DD"))
}

pub fn parse_event_time(raw: &str, field: &'static str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ValidationError::Format(field, "HH:MM"))
}

pub fn parse_price(raw: &str) -> Result<Decimal, ValidationError> {
    let price: Decimal = raw.trim().parse().map_err(|_| ValidationError::Price)?;
    if price < Decimal::ZERO {
        return Err(ValidationError::Price);
    }
    Ok(price)
}

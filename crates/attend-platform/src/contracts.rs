use serde::{Deserialize, Serialize};

use attend_core::models::{
    EventDraft, RsvpSubmission, ValidationError, non_empty, parse_event_date, parse_event_time,
    parse_price,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RsvpForm {
    pub name: String,
    pub email: String,
    pub event_id: String,
}

impl RsvpForm {
    pub fn validate(&self) -> Result<RsvpSubmission, ValidationError> {
        RsvpSubmission::parse(&self.name, &self.email, &self.event_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub price: String,
    pub location: String,
    pub admin_pin: Option<String>,
}

impl EventForm {
    pub fn validate(&self) -> Result<EventDraft, ValidationError> {
        Ok(EventDraft {
            title: non_empty(&self.title, "title")?,
            description: self.description.trim().to_string(),
            date: parse_event_date(&self.date)?,
            start_time: parse_event_time(&self.start_time, "start_time")?,
            end_time: parse_event_time(&self.end_time, "end_time")?,
            price: parse_price(&self.price)?,
            location: non_empty(&self.location, "location")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteEventForm {
    pub event_id: String,
    pub admin_pin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsvpAccepted {
    pub message: String,
    pub rsvp: RsvpSubmission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCreated {
    pub message: String,
    pub event_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDeleted {
    pub message: String,
    pub event_id: i64,
}

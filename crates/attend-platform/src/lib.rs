pub mod config;
pub mod contracts;
pub mod db;
pub mod http;
pub mod lightning;
pub mod mailer;
pub mod rates;

pub use config::{MailSettings, ServiceConfig};
pub use contracts::{
    DeleteEventForm, EventCreated, EventDeleted, EventForm, PaymentStatusResponse, RsvpAccepted,
    RsvpForm,
};
pub use db::{connect_database, init_schema};
pub use http::build_http_client;
pub use lightning::{InvoiceError, IssuedInvoice, LightningClient, issue_invoice};
pub use mailer::Mailer;
pub use rates::RateClient;

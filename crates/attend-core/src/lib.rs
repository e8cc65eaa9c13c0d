pub mod models;
pub mod pending;

pub use models::{Event, EventDraft, RsvpSubmission, ValidationError};
pub use pending::{PendingPayment, PendingPayments, PollOutcome, SettlementCheck, poll_status};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use reqwest::Client;
use tracing::debug;

use crate::config::MailSettings;

/// Mailgun-style admin notifications. Delivery is always best-effort: the
/// caller logs failures and carries on, an RSVP is never blocked on mail.
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    settings: Option<MailSettings>,
}

impl Mailer {
    pub fn new(client: Client, settings: Option<MailSettings>) -> Self {
        Self { client, settings }
    }

    pub fn enabled(&self) -> bool {
        self.settings.is_some()
    }

    pub async fn notify_rsvp(
        &self,
        event_title: &str,
        event_date: NaiveDate,
        name: &str,
        email: &str,
    ) -> Result<()> {
        let Some(settings) = &self.settings else {
            debug!("mail disabled, skipping RSVP notification");
            return Ok(());
        };

        let subject = rsvp_subject(event_title, event_date);
        let body = rsvp_body(&subject, name, email);
        let from = format!("Attend <postmaster@{}>", settings.domain);
        let to = settings.receivers.join(", ");

        let response = self
            .client
            .post(format!("{}/{}/messages", settings.api_url, settings.domain))
            .basic_auth("api", Some(&settings.api_key))
            .form(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("subject", subject.as_str()),
                ("html", body.as_str()),
            ])
            .send()
            .await
            .context("mail request failed")?;

        if !response.status().is_success() {
            bail!("mail API returned {}", response.status());
        }
        Ok(())
    }
}

fn rsvp_subject(event_title: &str, event_date: NaiveDate) -> String {
    format!("New RSVP for \"{event_title}\" at {event_date}")
}

fn rsvp_body(subject: &str, name: &str, email: &str) -> String {
    format!(
        "<p>{subject}:</p>\n<p><strong>Name:</strong> {name}</p>\n<p><strong>Email:</strong> {email}</p>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_names_event_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 12).unwrap();
        assert_eq!(
            rsvp_subject("Supper Club", date),
            "New RSVP for \"Supper Club\" at 2026-09-12"
        );
    }

    #[test]
    fn body_carries_attendee_details() {
        let body = rsvp_body("subject line", "Alice", "alice@example.org");
        assert!(body.contains("subject line"));
        assert!(body.contains("Alice"));
        assert!(body.contains("alice@example.org"));
    }

    #[test]
    fn mailer_without_settings_is_disabled() {
        let mailer = Mailer::new(Client::new(), None);
        assert!(!mailer.enabled());
    }
}

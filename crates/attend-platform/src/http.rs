use std::time::Duration;

use reqwest::Client;

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// One shared client for every upstream call (rates, invoicing, mail).
/// The timeout bounds how long any single handler can hang on an upstream.
pub fn build_http_client() -> reqwest::Result<Client> {
    Client::builder().timeout(OUTBOUND_TIMEOUT).build()
}

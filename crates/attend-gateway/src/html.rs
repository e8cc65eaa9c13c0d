use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

pub struct PaymentPage<'a> {
    pub price: Decimal,
    pub currency: &'a str,
    pub qr_svg: &'a str,
    pub ln_invoice: &'a str,
    pub invoice_id: &'a str,
    pub event_id: i64,
    pub redirect_url: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    pub event_id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub rsvps: Vec<RsvpEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsvpEntry {
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The payment page a priced RSVP lands on: amount, QR code, the payable
/// string for copy/paste, and a script polling the status endpoint every
/// five seconds until settlement.
pub fn payment_page(page: &PaymentPage<'_>) -> String {
    // JSON-encode values that end up inside the inline script.
    let invoice_id_js = serde_json::to_string(page.invoice_id).unwrap_or_default();
    let ln_invoice_js = serde_json::to_string(page.ln_invoice).unwrap_or_default();
    let redirect_js = serde_json::to_string(&page.redirect_url).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Payment Required</title>
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 20px; line-height: 1.5; text-align: center; }}
      .qr-container {{ margin: 20px auto; max-width: 280px; }}
      .amount {{ font-size: 24px; font-weight: bold; margin: 20px 0; }}
      .invoice-container {{ display: flex; align-items: center; justify-content: center; gap: 8px; margin: 16px auto; max-width: 600px; }}
      input {{ flex: 1; padding: 12px; border: 1px solid #ddd; border-radius: 6px; font-family: monospace; background: #f5f5f5; overflow: hidden; text-overflow: ellipsis; }}
      .copy-btn, .wallet-btn {{ padding: 12px 16px; border: none; border-radius: 6px; background: #007AFF; color: white; cursor: pointer; white-space: nowrap; }}
      .status {{ color: #666; margin: 10px 0; }}
    </style>
  </head>
  <body>
    <h1>Payment Required</h1>
    <div class="amount">{price} {currency}</div>
    <div class="qr-container">{qr_svg}</div>
    <p>Scan the QR code to complete your payment, or copy this invoice into your wallet:</p>
    <div class="invoice-container">
      <input type="text" value="{ln_invoice}" readonly />
      <button class="copy-btn" onclick="copyInvoice()">Copy Invoice</button>
      <button class="wallet-btn" onclick="openInWallet()">Open in Wallet</button>
    </div>
    <p>After payment, your RSVP will be confirmed automatically</p>
    <div id="status" class="status"></div>
    <div id="timer" class="status">Checking payment status...</div>
    <script>
      const invoiceId = {invoice_id_js};
      const lnInvoice = {ln_invoice_js};
      const redirectUrl = {redirect_js};
      const eventId = {event_id};

      function copyInvoice() {{
        const input = document.querySelector('input');
        input.select();
        document.execCommand('copy');
      }}

      async function openInWallet() {{
        // Browser wallets first, then the lightning: protocol handler.
        if (window.webln) {{
          try {{
            await window.webln.enable();
            await window.webln.sendPayment(lnInvoice);
            return;
          }} catch (e) {{
            console.log('WebLN failed:', e);
          }}
        }}
        window.location.href = 'lightning:' + lnInvoice;
      }}

      function checkPaymentStatus() {{
        fetch('/payment-status/' + encodeURIComponent(invoiceId))
          .then((response) => response.json())
          .then((data) => {{
            if (!data.paid) {{
              return;
            }}
            document.getElementById('status').textContent = 'Payment received, RSVP confirmed.';
            if (redirectUrl) {{
              window.location.href = redirectUrl + '/?rsvp-success=true&event-id=' + eventId;
            }}
          }});
      }}

      let seconds = 5;
      setInterval(() => {{
        seconds--;
        document.getElementById('timer').textContent =
          'Checking payment status in ' + (seconds + 1) + 's...';
        if (seconds <= 0) {{
          checkPaymentStatus();
          seconds = 5;
        }}
      }}, 1000);
    </script>
  </body>
</html>
"#,
        price = page.price,
        currency = escape_html(page.currency),
        qr_svg = page.qr_svg,
        ln_invoice = escape_html(page.ln_invoice),
        invoice_id_js = invoice_id_js,
        redirect_js = redirect_js,
        event_id = page.event_id,
    )
}

/// Admin view: every event with its RSVPs grouped underneath.
pub fn rsvp_list_page(groups: &[EventGroup]) -> String {
    let mut sections = String::new();
    for group in groups {
        let rsvps = if group.rsvps.is_empty() {
            "<p>No RSVPs yet</p>".to_string()
        } else {
            group
                .rsvps
                .iter()
                .map(|rsvp| {
                    format!(
                        r#"<div class="rsvp-item">{} ({}) - {}</div>"#,
                        escape_html(&rsvp.name),
                        escape_html(&rsvp.email),
                        format_date(rsvp.created_at.date_naive()),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        sections.push_str(&format!(
            r#"<div class="event-group">
  <h2>{} - {}</h2>
  {}
</div>
"#,
            escape_html(&group.title),
            format_date(group.date),
            rsvps,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Event RSVPs</title>
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 20px; line-height: 1.5; }}
      .event-group {{ margin-bottom: 30px; }}
      .rsvp-item {{ margin: 10px 0; }}
    </style>
  </head>
  <body>
    <h1>Event RSVPs</h1>
    {sections}
  </body>
</html>
"#
    )
}

// en-GB short date, e.g. "12 Sep 2026".
fn format_date(date: NaiveDate) -> String {
    date.format("%-d %b %Y").to_string()
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            escape_html(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn payment_page_embeds_invoice_and_poll_script() {
        let page = payment_page(&PaymentPage {
            price: "12.50".parse().unwrap(),
            currency: "GBP",
            qr_svg: "<svg>qr</svg>",
            ln_invoice: "lnbc1example",
            invoice_id: "inv-42",
            event_id: 4,
            redirect_url: None,
        });

        assert!(page.contains("12.50 GBP"));
        assert!(page.contains("<svg>qr</svg>"));
        assert!(page.contains(r#"value="lnbc1example""#));
        assert!(page.contains(r#"const invoiceId = "inv-42";"#));
        assert!(page.contains("const redirectUrl = null;"));
        assert!(page.contains("checkPaymentStatus()"));
    }

    #[test]
    fn payment_page_offers_wallet_handoff_and_countdown() {
        let page = payment_page(&PaymentPage {
            price: Decimal::from(8),
            currency: "GBP",
            qr_svg: "<svg/>",
            ln_invoice: "lnbc1wallet",
            invoice_id: "inv-7",
            event_id: 3,
            redirect_url: None,
        });

        assert!(page.contains("Open in Wallet"));
        assert!(page.contains(r#"const lnInvoice = "lnbc1wallet";"#));
        assert!(page.contains("window.webln"));
        assert!(page.contains("'lightning:' + lnInvoice"));
        assert!(page.contains(r#"id="timer""#));
        assert!(page.contains(", 1000);"));
    }

    #[test]
    fn payment_page_carries_redirect_when_configured() {
        let page = payment_page(&PaymentPage {
            price: Decimal::from(5),
            currency: "GBP",
            qr_svg: "<svg/>",
            ln_invoice: "lnbc1",
            invoice_id: "inv-1",
            event_id: 9,
            redirect_url: Some("https://example.org"),
        });
        assert!(page.contains(r#"const redirectUrl = "https://example.org";"#));
        assert!(page.contains("const eventId = 9;"));
    }

    #[test]
    fn rsvp_list_groups_and_escapes() {
        let groups = vec![
            EventGroup {
                event_id: 1,
                title: "Supper <Club>".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
                rsvps: vec![RsvpEntry {
                    name: "Alice & Bob".to_string(),
                    email: "alice@example.org".to_string(),
                    created_at: Utc::now(),
                }],
            },
            EventGroup {
                event_id: 2,
                title: "Quiet Night".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                rsvps: vec![],
            },
        ];

        let page = rsvp_list_page(&groups);
        assert!(page.contains("Supper &lt;Club&gt; - 12 Sep 2026"));
        assert!(page.contains("Alice &amp; Bob (alice@example.org)"));
        assert!(page.contains("Quiet Night - 1 Oct 2026"));
        assert!(page.contains("No RSVPs yet"));
    }
}

use chrono::{DateTime, Duration, Utc};

use attend_core::models::Event;

// The original booking flow ignores the stored end time and blocks two
// hours from the start; kept for parity with calendars already issued.
const DEFAULT_DURATION_HOURS: i64 = 2;

pub fn attachment_filename(title: &str) -> String {
    let stem = title.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{stem}.ics")
}

pub fn build_event_ics(event: &Event, now: DateTime<Utc>) -> String {
    let start = event.date.and_time(event.start_time);
    let end = start + Duration::hours(DEFAULT_DURATION_HOURS);

    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//attend//event-rsvp//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:event-{}@attend", event.id),
        format!("DTSTAMP:{}", now.format("%Y%m%dT%H%M%SZ")),
        format!("DTSTART:{}", start.format("%Y%m%dT%H%M%S")),
        format!("DTEND:{}", end.format("%Y%m%dT%H%M%S")),
        format!("SUMMARY:{}", escape_text(&event.title)),
        format!("DESCRIPTION:{}", escape_text(&event.description)),
        format!("LOCATION:{}", escape_text(&event.location)),
        "STATUS:CONFIRMED".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

// RFC 5545 text escaping.
fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use rust_decimal::Decimal;

    use super::*;

    fn event() -> Event {
        Event {
            id: 7,
            title: "Supper Club; autumn".to_string(),
            description: "Food, drinks\nand talks".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            price: Decimal::ZERO,
            location: "The Old Hall, Leeds".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn calendar_framing_and_two_hour_duration() {
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        let ics = build_event_ics(&event(), now);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("BEGIN:VEVENT\r\n"));
        assert!(ics.contains("DTSTART:20260912T190000\r\n"));
        assert!(ics.contains("DTEND:20260912T210000\r\n"));
        assert!(ics.contains("DTSTAMP:20260826T120000Z\r\n"));
        assert!(ics.contains("STATUS:CONFIRMED\r\n"));
    }

    #[test]
    fn text_fields_are_escaped() {
        let ics = build_event_ics(&event(), Utc::now());
        assert!(ics.contains("SUMMARY:Supper Club\\; autumn"));
        assert!(ics.contains("DESCRIPTION:Food\\, drinks\\nand talks"));
        assert!(ics.contains("LOCATION:The Old Hall\\, Leeds"));
    }

    #[test]
    fn filename_replaces_whitespace() {
        assert_eq!(attachment_filename("Supper Club 2026"), "Supper_Club_2026.ics");
        assert_eq!(attachment_filename("one"), "one.ics");
    }
}

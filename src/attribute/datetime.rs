//! Datetime attributes.
//!
//! Store precedence, first match wins:
//!
//! | Option | Encoding |
//! |--------|----------|
//! | `format` | strftime (or named `short`/`long`/`db`) of the UTC instant |
//! | `formatter` | closure over the instant as assigned |
//! | Elasticsearch storage | `2018-12-13T20:27:13.000Z` |
//! | none | `Mon, 10 Mar 2008 07:00:00 -0000` |
//!
//! The default encoding has whole-second precision, so sub-second instants
//! come back truncated. Elasticsearch storage keeps milliseconds.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, wrong_type};
use crate::model::Value;
use crate::{Error, Result};

const RFC822_UTC: &str = "%a, %d %b %Y %H:%M:%S -0000";
const ISO8601_MILLIS_UTC: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const ZONED_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug)]
pub struct DateTimeHandler {
    name: String,
    options: Options,
}

impl DateTimeHandler {
    pub const OPTIONS: &'static [&'static str] = &["format", "formatter"];

    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("datetime", name, Self::OPTIONS)?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) => parse(s).map(Value::DateTime).ok_or_else(|| Error::InvalidValue {
                attribute: self.name.clone(),
                message: format!("cannot parse {s:?} as a datetime"),
            }),
            Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
            other => Err(wrong_type(&self.name, other)),
        }
    }

    fn encode(&self, instant: &DateTime<FixedOffset>) -> String {
        let utc = instant.with_timezone(&Utc);
        if let Some(format) = &self.options.format {
            utc.format(named_format(format)).to_string()
        } else if let Some(formatter) = &self.options.formatter {
            formatter(instant)
        } else if self.options.is_elasticsearch() {
            utc.format(ISO8601_MILLIS_UTC).to_string()
        } else {
            utc.format(RFC822_UTC).to_string()
        }
    }
}

fn named_format(format: &str) -> &str {
    match format {
        "short" => "%d %b %H:%M",
        "long" => "%B %d, %Y %H:%M",
        "db" => "%Y-%m-%d %H:%M:%S",
        "iso8601" => "%Y-%m-%dT%H:%M:%SZ",
        "rfc822" => RFC822_UTC,
        custom => custom,
    }
}

/// Parse the common textual forms; zone-less inputs are taken as UTC.
pub fn parse(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt);
    }
    if let Some(dt) = ZONED_FORMATS.iter().find_map(|f| DateTime::parse_from_str(text, f).ok()) {
        return Some(dt);
    }
    if let Some(naive) = NAIVE_FORMATS.iter().find_map(|f| NaiveDateTime::parse_from_str(text, f).ok()) {
        return Some(naive.and_utc().fixed_offset());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

impl AttributeHandler for DateTimeHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        self.coerce(&value)
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        self.coerce(&Value::from(stored.clone()))
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        Ok(match self.coerce(value)? {
            Value::DateTime(dt) => JsonValue::String(self.encode(&dt)),
            _ => JsonValue::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::StorageType;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn pacific_instant() -> Value {
        let pacific = FixedOffset::west_opt(8 * 3600).unwrap();
        Value::DateTime(pacific.timestamp_opt(1_544_732_833, 0).unwrap())
    }

    #[test]
    fn test_parse_forms() {
        let parsed = parse("2012/04/18 17:50:08 -0700").unwrap();
        assert_eq!(parsed.with_timezone(&Utc).to_rfc3339(), "2012-04-19T00:50:08+00:00");
        assert!(parse("Mon, 10 Mar 2008 07:00:00 -0000").is_some());
        assert!(parse("2018-12-13T12:27:13-08:00").is_some());
        assert_eq!(parse("2008-03-10").unwrap().to_rfc3339(), "2008-03-10T00:00:00+00:00");
        assert!(parse("next tuesday").is_none());
    }

    #[test]
    fn test_default_store_is_rfc822_utc() {
        let handler = DateTimeHandler::new("testme", Options::new()).unwrap();
        let local = Value::from(Utc.with_ymd_and_hms(2008, 3, 10, 7, 0, 0).unwrap());
        let stored = handler.to_store(&local).unwrap();
        assert_eq!(stored, "Mon, 10 Mar 2008 07:00:00 -0000");
        assert_eq!(handler.from_store(&stored).unwrap(), local);
    }

    #[test]
    fn test_elasticsearch_store() {
        let options = Options::new().storage_type(StorageType::Elasticsearch);
        let handler = DateTimeHandler::new("testme", options).unwrap();
        assert_eq!(handler.to_store(&pacific_instant()).unwrap(), "2018-12-13T20:27:13.000Z");
    }

    #[test]
    fn test_format_wins_over_storage_type() {
        let options = Options::new().format("short").storage_type(StorageType::Elasticsearch);
        let handler = DateTimeHandler::new("testme", options).unwrap();
        assert_eq!(handler.to_store(&pacific_instant()).unwrap(), "13 Dec 20:27");
    }

    #[test]
    fn test_format_wins_over_formatter() {
        let options = Options::new().format("%Y-%m").formatter(|dt| dt.format("%Y").to_string());
        let handler = DateTimeHandler::new("testme", options).unwrap();
        assert_eq!(handler.to_store(&pacific_instant()).unwrap(), "2018-12");
    }

    #[test]
    fn test_formatter_wins_over_storage_type() {
        let options = Options::new()
            .formatter(|dt| dt.format("%Y").to_string())
            .storage_type(StorageType::Elasticsearch);
        let handler = DateTimeHandler::new("testme", options).unwrap();
        assert_eq!(handler.to_store(&pacific_instant()).unwrap(), "2018");
    }

    #[test]
    fn test_default_store_drops_fractional_seconds() {
        let handler = DateTimeHandler::new("testme", Options::new()).unwrap();
        let precise = Value::from(Utc.timestamp_opt(1_544_732_833, 250_000_000).unwrap());
        let stored = handler.to_store(&precise).unwrap();
        let whole = Value::from(Utc.timestamp_opt(1_544_732_833, 0).unwrap());
        assert_eq!(handler.from_store(&stored).unwrap(), whole);
    }

    #[test]
    fn test_formatter_closure() {
        let options = Options::new().formatter(|dt| dt.format("%Y").to_string());
        let handler = DateTimeHandler::new("testme", options).unwrap();
        assert_eq!(handler.to_store(&pacific_instant()).unwrap(), "2018");
    }

    #[test]
    fn test_unparseable_string() {
        let handler = DateTimeHandler::new("testme", Options::new()).unwrap();
        assert!(matches!(
            handler.from_value(Value::from("not a date")),
            Err(Error::InvalidValue { .. })
        ));
        assert_eq!(handler.from_value(Value::from("")).unwrap(), Value::Null);
    }

    proptest! {
        #[test]
        fn prop_default_store_round_trips_whole_seconds(secs in 0i64..4_102_444_800, offset in -12i32..=14) {
            let handler = DateTimeHandler::new("testme", Options::new()).unwrap();
            let zone = FixedOffset::east_opt(offset * 3600).unwrap();
            let value = handler.from_value(Value::DateTime(zone.timestamp_opt(secs, 0).unwrap())).unwrap();
            let back = handler.from_store(&handler.to_store(&value).unwrap()).unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn prop_elasticsearch_store_round_trips_millis(millis in 0i64..4_102_444_800_000) {
            let handler = DateTimeHandler::new("testme", Options::new().storage_type(StorageType::Elasticsearch)).unwrap();
            let value = handler.from_value(Value::from(Utc.timestamp_millis_opt(millis).unwrap())).unwrap();
            let back = handler.from_store(&handler.to_store(&value).unwrap()).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}

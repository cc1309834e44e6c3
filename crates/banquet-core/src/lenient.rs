//! Forgiving deserializers for fields the SPA writes loosely.
//!
//! Plate counts arrive as `110`, `"110"`, `110.0` or `""`; dates as
//! `"2025-09-14"` or `"14/09/2025"`. A field that cannot be read becomes
//! its zero value instead of failing the whole document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, Deserializer, IgnoredAny, Visitor};
use serde::Deserialize;
use std::fmt;

use crate::calendar::parse_import_date;

/// Integer count: numbers are truncated, numeric strings parsed, else 0.
pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(CountVisitor)
}

struct CountVisitor;

impl<'de> Visitor<'de> for CountVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a count")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        Ok(i64::try_from(v).unwrap_or(0))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        Ok(float_to_count(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        let cleaned: String = v.trim().chars().filter(|c| *c != ',').collect();
        Ok(cleaned
            .parse::<i64>()
            .ok()
            .or_else(|| cleaned.parse::<f64>().ok().map(float_to_count))
            .unwrap_or(0))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_unit<E: de::Error>(self) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_none<E: de::Error>(self) -> Result<i64, E> {
        Ok(0)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(CountVisitor)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<i64, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(0)
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<i64, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(0)
    }
}

fn float_to_count(v: f64) -> i64 {
    if v.is_finite() && v.abs() < i64::MAX as f64 {
        v.trunc() as i64
    } else {
        0
    }
}

/// Calendar date in any of the accepted spellings; unreadable values are `None`.
pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => parse_import_date(&s),
        serde_json::Value::Number(n) => n.as_f64().and_then(|serial| parse_import_date(&serial.to_string())),
        _ => None,
    })
}

/// RFC 3339 timestamp; unreadable values are `None`.
pub fn timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    })
}

/// Boolean that also accepts `"true"`/`"false"` strings; anything else is `false`.
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "count")]
        plates: i64,
        #[serde(default, deserialize_with = "date")]
        on: Option<NaiveDate>,
        #[serde(default, deserialize_with = "flag")]
        enabled: bool,
    }

    #[test]
    fn test_count_coercion() {
        for (raw, expected) in [
            (json!(110), 110),
            (json!("110"), 110),
            (json!(" 1,200 "), 1200),
            (json!(12.9), 12),
            (json!(""), 0),
            (json!("many"), 0),
            (json!(null), 0),
            (json!("100000000000000000"), 100_000_000_000_000_000),
            (json!("99999999999999999999"), 0),
            (json!(u64::MAX), 0),
            (json!(1e300), 0),
        ] {
            let sample: Sample = serde_json::from_value(json!({ "plates": raw })).unwrap();
            assert_eq!(sample.plates, expected);
        }
        let sample: Sample = serde_json::from_value(json!({})).unwrap();
        assert_eq!(sample.plates, 0);
    }

    #[test]
    fn test_date_coercion() {
        let sample: Sample = serde_json::from_value(json!({ "on": "14/09/2025" })).unwrap();
        assert_eq!(sample.on, NaiveDate::from_ymd_opt(2025, 9, 14));

        let sample: Sample = serde_json::from_value(json!({ "on": "soon" })).unwrap();
        assert_eq!(sample.on, None);
    }

    #[test]
    fn test_flag_coercion() {
        let sample: Sample = serde_json::from_value(json!({ "enabled": "true" })).unwrap();
        assert!(sample.enabled);
        let sample: Sample = serde_json::from_value(json!({ "enabled": 1 })).unwrap();
        assert!(!sample.enabled);
    }
}

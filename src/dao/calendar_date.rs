//! Serde adapter storing civil dates as `YYYY-MM-DD` strings in every backend.

use serde::{Deserialize, Deserializer, Serializer};
use time::{Date, format_description::well_known::Iso8601};

/// Serialize a date as `YYYY-MM-DD`.
pub fn serialize<S>(value: &Date, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = format(*value).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// Deserialize a `YYYY-MM-DD` date.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

/// Format a date as `YYYY-MM-DD`.
pub fn format(value: Date) -> Result<String, time::error::Format> {
    value.format(&Iso8601::DATE)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, &Iso8601::DATE)
}

/// Same encoding for optional dates.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => super::serialize(date, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use time::macros::date;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "crate::dao::calendar_date")]
        day: Date,
        #[serde(with = "crate::dao::calendar_date::option", default)]
        maybe: Option<Date>,
    }

    #[test]
    fn dates_are_plain_iso_strings() {
        let holder = Holder {
            day: date!(2024 - 06 - 01),
            maybe: None,
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"day":"2024-06-01","maybe":null}"#);
        assert_eq!(serde_json::from_str::<Holder>(&json).unwrap(), holder);
    }

    #[test]
    fn rejects_non_iso_dates() {
        assert!(serde_json::from_str::<Holder>(r#"{"day":"01/06/2024"}"#).is_err());
    }
}

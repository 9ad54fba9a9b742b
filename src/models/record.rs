use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One OCR result together with the instant it was recognized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedTextRecord {
    pub text: String,
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl RecognizedTextRecord {
    /// Builds a record from raw recognizer output. Returns `None` when the text is
    /// empty after trimming. The timestamp is cut to the stored millisecond precision.
    pub fn new(text: &str, timestamp: DateTime<Utc>) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            text: text.to_string(),
            timestamp: timestamp.trunc_subsecs(3),
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Sorts newest first. Records with equal timestamps keep their relative order.
pub fn sort_newest_first(records: &mut [RecognizedTextRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

pub fn parse_timestamp(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow::anyhow!("invalid timestamp '{value}': {err}"))
}

/// `2024-05-01T10:00:00.000Z`, the millisecond ISO-8601 form the list has always been stored in.
mod iso_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(de::Error::custom)
    }
}

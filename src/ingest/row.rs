//! OpenTSDB put row model and JSON parser
//!
//! A request body is either one JSON object or an array of objects,
//! each carrying `metric` (string, required), `value` (number,
//! required), and optionally `timestamp` (integer) and `tags`
//! (string-to-string object). Tags are kept as an ordered pair list,
//! not a map: keys need not be unique and the order keys appear in the
//! input is preserved all the way to the storage engine.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::error::IngestError;

/// One tag pair from a put request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

/// One submitted data point
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Metric name; never empty after a successful parse
    pub metric: String,
    /// Tag pairs in input order
    pub tags: Vec<Tag>,
    /// Timestamp; `0` means unspecified, unit is ambiguous until
    /// normalized to milliseconds
    pub timestamp: i64,
    /// Sample value
    pub value: f64,
}

/// Ordered tag list with a map-shaped JSON representation
///
/// Deserialized through a map visitor so the pair order matches the
/// order keys are visited in the input document.
#[derive(Debug, Clone, Default, PartialEq)]
struct TagList(Vec<Tag>);

impl<'de> Deserialize<'de> for TagList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TagListVisitor;

        impl<'de> Visitor<'de> for TagListVisitor {
            type Value = TagList;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of string tag values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut tags = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    tags.push(Tag { key, value });
                }
                Ok(TagList(tags))
            }
        }

        deserializer.deserialize_map(TagListVisitor)
    }
}

/// Wire shape of one put object
#[derive(Debug, Deserialize)]
struct JsonRow {
    metric: String,
    #[serde(default)]
    timestamp: i64,
    value: f64,
    #[serde(default)]
    tags: TagList,
}

impl JsonRow {
    fn into_row(self) -> Result<Row, IngestError> {
        if self.metric.is_empty() {
            return Err(IngestError::Unmarshal(
                "metric cannot be empty".to_string(),
            ));
        }
        Ok(Row {
            metric: self.metric,
            tags: self.tags.0,
            timestamp: self.timestamp,
            value: self.value,
        })
    }
}

/// Reusable container for the rows parsed from one request body
///
/// Created empty, populated by one [`unmarshal`](RowBatch::unmarshal)
/// call, consumed once by the batch writer, then cleared. Never
/// partially reused across requests.
#[derive(Debug, Default)]
pub struct RowBatch {
    /// Parsed rows in input order
    pub rows: Vec<Row>,
}

impl RowBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in the batch
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop all rows, keeping the backing allocation
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Parse a request body into this batch
    ///
    /// All-or-nothing: on any error the batch is left empty and the
    /// whole request must be rejected.
    pub fn unmarshal(&mut self, data: &[u8]) -> Result<(), IngestError> {
        self.rows.clear();
        let result = self.unmarshal_inner(data);
        if result.is_err() {
            self.rows.clear();
        }
        result
    }

    fn unmarshal_inner(&mut self, data: &[u8]) -> Result<(), IngestError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| IngestError::Unmarshal(format!("invalid UTF-8: {}", e)))?;

        let trimmed = text.trim();
        if trimmed.starts_with('[') {
            let parsed: Vec<JsonRow> = serde_json::from_str(trimmed)
                .map_err(|e| IngestError::Unmarshal(e.to_string()))?;
            self.rows.reserve(parsed.len());
            for json in parsed {
                self.rows.push(json.into_row()?);
            }
            Ok(())
        } else if trimmed.starts_with('{') {
            let parsed: JsonRow = serde_json::from_str(trimmed)
                .map_err(|e| IngestError::Unmarshal(e.to_string()))?;
            self.rows.push(parsed.into_row()?);
            Ok(())
        } else {
            Err(IngestError::Unmarshal(
                "expected JSON object or array".to_string(),
            ))
        }
    }
}

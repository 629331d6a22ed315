//! Reading set parsing and validation.
//!
//! The model is asked for a JSON object keyed `pH`, `ammonia`, `nitrite` and
//! `nitrate`. Nothing guarantees it complies, so the completion text is checked
//! key by key: a missing key or a non-numeric value is a parse failure rather
//! than a hole in the displayed results.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StripError, StripResult};

/// Unit shown next to the three nitrogen-cycle readings.
pub const PPM: &str = "ppm";

/// One analysis worth of water-quality values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingSet {
    #[serde(rename = "pH")]
    pub ph: f64,
    /// ppm
    pub ammonia: f64,
    /// ppm
    pub nitrite: f64,
    /// ppm
    pub nitrate: f64,
}

/// A labelled value with its display unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub label: &'static str,
    pub value: f64,
    pub unit: Option<&'static str>,
}

impl ReadingSet {
    /// Parse the text of a completion.
    ///
    /// A surrounding Markdown code fence is tolerated; anything else must be a
    /// bare JSON object.
    pub fn from_completion(text: &str) -> StripResult<Self> {
        let body = strip_code_fence(text);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| StripError::parse(format!("completion is not valid JSON: {}", e))
                .with_metadata("completion", truncate(text, 200)))?;
        let object = value
            .as_object()
            .ok_or_else(|| StripError::parse("completion JSON is not an object"))?;

        Ok(Self {
            ph: numeric(object, "pH")?,
            ammonia: numeric(object, "ammonia")?,
            nitrite: numeric(object, "nitrite")?,
            nitrate: numeric(object, "nitrate")?,
        })
    }

    /// The four readings in display order.
    pub fn entries(&self) -> [Reading; 4] {
        [
            Reading {
                label: "pH",
                value: self.ph,
                unit: None,
            },
            Reading {
                label: "Ammonia",
                value: self.ammonia,
                unit: Some(PPM),
            },
            Reading {
                label: "Nitrite",
                value: self.nitrite,
                unit: Some(PPM),
            },
            Reading {
                label: "Nitrate",
                value: self.nitrate,
                unit: Some(PPM),
            },
        ]
    }
}

fn numeric(object: &Map<String, Value>, key: &str) -> StripResult<f64> {
    let value = object
        .get(key)
        .ok_or_else(|| StripError::parse(format!("missing key '{}'", key)))?;
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| StripError::parse(format!("key '{}' is not a number: {}", key, value)))
}

/// Unwrap ```` ```json ... ``` ```` if the whole completion is one fenced block.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    match inner.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => inner.trim(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

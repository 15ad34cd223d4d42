use serde::de::DeserializeOwned;

use crate::error::DiskError;

/// The listing endpoint, asked for `_embedded.items` fields only, answers
/// `{"_embedded":{"items":[...]}}`. The wrapper around the array has a fixed
/// length for that request shape and is cut off by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    prefix_len: usize,
    suffix_len: usize,
}

impl Envelope {
    pub const LISTING: Envelope = Envelope::new(r#"{"_embedded":{"items":"#.len(), "}}".len());

    pub const fn new(prefix_len: usize, suffix_len: usize) -> Self {
        Self {
            prefix_len,
            suffix_len,
        }
    }

    /// The inner JSON array, still as text.
    pub fn strip<'a>(&self, body: &'a str) -> Result<&'a str, DiskError> {
        let body = body.trim_end();
        let framed = self.prefix_len + self.suffix_len;
        if body.len() < framed {
            return Err(DiskError::DecodeFailed(format!(
                "body of {} bytes is shorter than the {framed}-byte envelope",
                body.len()
            )));
        }

        let inner = body
            .get(self.prefix_len..body.len() - self.suffix_len)
            .ok_or_else(|| DiskError::DecodeFailed("envelope splits a character".into()))?
            .trim();

        if !(inner.starts_with('[') && inner.ends_with(']')) {
            return Err(DiskError::DecodeFailed(
                "envelope does not wrap a JSON array".into(),
            ));
        }

        Ok(inner)
    }

    pub fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<Vec<T>, DiskError> {
        let inner = self.strip(body)?;
        Ok(serde_json::from_str(inner)?)
    }
}

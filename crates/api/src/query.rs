//! Shared query parameter helpers for API handlers.

use serde::{Deserialize, Deserializer};

/// Treat an empty query value (`?status=`) as absent.
///
/// Use with `#[serde(default, deserialize_with = "empty_as_none")]`.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Parse an optional enum-like query value with its `FromStr` impl.
pub fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, T::Err>
where
    T: std::str::FromStr,
{
    value.map(str::parse).transpose()
}

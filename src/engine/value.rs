use std::fmt;

use crate::foundation::error::{MixError, MixResult};

/// Media capabilities: a media type plus ordered `key=value` fields.
///
/// Renders as the engine's caps string, e.g. `video/x-raw,width=640,height=360`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caps {
    media_type: String,
    fields: Vec<(String, String)>,
}

impl Caps {
    /// Caps with only a media type.
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, replacing an existing field with the same key.
    pub fn field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    /// Raw video caps of the given size.
    pub fn raw_video(width: u32, height: u32) -> Self {
        Self::new("video/x-raw")
            .field("width", width)
            .field("height", height)
    }

    /// Media type, e.g. `video/x-raw`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Look up a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a caps string of the form `media/type, key=value, ...`.
    pub fn parse(s: &str) -> MixResult<Self> {
        let mut parts = s.split(',').map(str::trim);
        let media_type = parts
            .next()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| MixError::validation(format!("caps '{s}' has no media type")))?;
        let mut caps = Self::new(media_type);
        for part in parts.filter(|p| !p.is_empty()) {
            let (k, v) = part.split_once('=').ok_or_else(|| {
                MixError::validation(format!("caps field '{part}' is not key=value"))
            })?;
            caps = caps.field(k.trim(), v.trim());
        }
        Ok(caps)
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.media_type)?;
        for (k, v) in &self.fields {
            write!(f, ",{k}={v}")?;
        }
        Ok(())
    }
}

/// A property value pushed onto an element or pad.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Signed integer (also used for enum values).
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// Media caps.
    Caps(Caps),
}

impl PropertyValue {
    /// Integer view, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Caps view, if this is a caps value.
    pub fn as_caps(&self) -> Option<&Caps> {
        match self {
            Self::Caps(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Caps(c) => write!(f, "{c}"),
        }
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Caps> for PropertyValue {
    fn from(value: Caps) -> Self {
        Self::Caps(value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/value.rs"]
mod tests;

//! Attribute value types shared between the source boundary and the table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an attribute column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrType {
    Bool,
    Float,
    String,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool => write!(f, "bool"),
            AttrType::Float => write!(f, "float"),
            AttrType::String => write!(f, "string"),
        }
    }
}

/// Value carried by an attribute cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Float(f64),
    String(String),
}

impl AttrValue {
    /// Declared type of this value
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::String(_) => AttrType::String,
        }
    }

    /// Parse user-entered text against an expected column type.
    ///
    /// Returns the reason string on failure so the caller can surface it
    /// next to the cell.
    pub fn parse(ty: AttrType, text: &str) -> Result<AttrValue, String> {
        let text = text.trim();
        match ty {
            AttrType::Bool => match text {
                "true" | "1" | "on" => Ok(AttrValue::Bool(true)),
                "false" | "0" | "off" => Ok(AttrValue::Bool(false)),
                other => Err(format!("'{}' is not a boolean", other)),
            },
            AttrType::Float => text
                .parse::<f64>()
                .map(AttrValue::Float)
                .map_err(|_| format!("'{}' is not a number", text)),
            AttrType::String => Ok(AttrValue::String(text.to_string())),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(value) => write!(f, "{}", value),
            AttrValue::Float(value) => write!(f, "{}", format_float(*value)),
            AttrValue::String(value) => write!(f, "{}", value),
        }
    }
}

/// Fixed-precision display formatting for float cells
pub fn format_float(value: f64) -> String {
    format!("{:.4}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float() {
        assert_eq!(
            AttrValue::parse(AttrType::Float, " 1.5 "),
            Ok(AttrValue::Float(1.5))
        );
        assert!(AttrValue::parse(AttrType::Float, "abc").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(
            AttrValue::parse(AttrType::Bool, "true"),
            Ok(AttrValue::Bool(true))
        );
        assert_eq!(
            AttrValue::parse(AttrType::Bool, "0"),
            Ok(AttrValue::Bool(false))
        );
        assert!(AttrValue::parse(AttrType::Bool, "yes").is_err());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0000");
        assert_eq!(format_float(0.12345), "0.1235");
    }

    #[test]
    fn test_attr_type() {
        assert_eq!(AttrValue::Bool(true).attr_type(), AttrType::Bool);
        assert_eq!(AttrValue::Float(0.0).attr_type(), AttrType::Float);
        assert_eq!(
            AttrValue::String("x".to_string()).attr_type(),
            AttrType::String
        );
    }
}

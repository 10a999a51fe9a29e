//! Core types used throughout the contentscan library.
//!
//! This module defines the property type domain, the anchored path pattern
//! used by the diggers, and the length gate shared by every digger.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::core::error::DispatchError;

/// Type of a content property.
///
/// The canonical names (`Binary`, `String`, `URI`, ...) appear in job and
/// event topics and in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Text.
    String,
    /// Raw bytes.
    Binary,
    /// 64-bit integer.
    Long,
    /// Floating point number.
    Double,
    /// Calendar date.
    Date,
    /// Boolean flag.
    Boolean,
    /// Qualified name.
    Name,
    /// Repository path.
    Path,
    /// Hard reference to another node.
    Reference,
    /// Weak reference to another node.
    WeakReference,
    /// URI.
    #[serde(rename = "URI")]
    Uri,
    /// Arbitrary precision decimal.
    Decimal,
}

impl PropertyType {
    /// All property types, in canonical order.
    pub const ALL: [PropertyType; 12] = [
        Self::String,
        Self::Binary,
        Self::Long,
        Self::Double,
        Self::Date,
        Self::Boolean,
        Self::Name,
        Self::Path,
        Self::Reference,
        Self::WeakReference,
        Self::Uri,
        Self::Decimal,
    ];

    /// Returns the canonical name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Long => "Long",
            Self::Double => "Double",
            Self::Date => "Date",
            Self::Boolean => "Boolean",
            Self::Name => "Name",
            Self::Path => "Path",
            Self::Reference => "Reference",
            Self::WeakReference => "WeakReference",
            Self::Uri => "URI",
            Self::Decimal => "Decimal",
        }
    }

    /// Returns `true` if values of this type are scanned as UTF-8 text.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Uri | Self::Name | Self::Path)
    }

    /// Returns `true` if values of this type can be turned into a scan stream.
    pub fn is_scannable(&self) -> bool {
        *self == Self::Binary || self.is_textual()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PropertyType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                DispatchError::validation("propertyType", format!("unknown property type: {}", s))
            })
    }
}

/// Parses a list of canonical type names into a set.
pub fn property_types_from_names<S: AsRef<str>>(
    names: &[S],
) -> Result<BTreeSet<PropertyType>, DispatchError> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

/// A regular expression that must match a whole property path.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles the pattern. The match is always anchored at both ends.
    pub fn new(source: impl Into<String>) -> Result<Self, DispatchError> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            tracing::debug!(pattern = %source, error = %e, "Rejected path pattern");
            DispatchError::validation("pattern", format!("Invalid parameter value for pattern: {}", source))
        })?;
        Ok(Self { source, regex })
    }

    /// Returns `true` if the whole path matches.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Returns `true` if a value of `length` bytes passes the `max_length` limit.
///
/// A limit of `-1` admits every length.
pub fn check_length(length: u64, max_length: i64) -> bool {
    if max_length == -1 {
        return true;
    }
    u64::try_from(max_length).map_or(false, |max| length <= max)
}

/// Rejects limits below `-1`.
pub(crate) fn validate_limit(parameter: &str, value: i64) -> Result<(), DispatchError> {
    if value < -1 {
        return Err(DispatchError::validation(
            parameter,
            format!("Invalid parameter value for {}: {}", parameter, value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_names_round_trip() {
        for t in PropertyType::ALL {
            assert_eq!(t.name().parse::<PropertyType>().unwrap(), t);
        }
        assert_eq!(PropertyType::Uri.to_string(), "URI");
        assert!("Blob".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_scannable_types() {
        assert!(PropertyType::Binary.is_scannable());
        assert!(PropertyType::String.is_textual());
        assert!(PropertyType::Uri.is_textual());
        assert!(!PropertyType::Long.is_scannable());
        assert!(!PropertyType::Binary.is_textual());
    }

    #[test]
    fn test_property_types_from_names() {
        let types = property_types_from_names(&["Binary", "String"]).unwrap();
        assert_eq!(types.len(), 2);
        assert!(types.contains(&PropertyType::Binary));

        let err = property_types_from_names(&["Binary", "Nope"]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_path_pattern_is_anchored() {
        let pattern = PathPattern::new("/content/.*/jcr:data").unwrap();
        assert!(pattern.matches("/content/a/jcr:data"));
        assert!(!pattern.matches("/x/content/a/jcr:data"));
        assert!(!pattern.matches("/content/a/jcr:data/more"));

        let alternation = PathPattern::new("/a|/b").unwrap();
        assert!(alternation.matches("/b"));
        assert!(!alternation.matches("/ab"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PathPattern::new("(unclosed").unwrap_err();
        assert_eq!(err.parameter(), Some("pattern"));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_check_length() {
        assert!(check_length(u64::MAX, -1));
        assert!(check_length(100, 100));
        assert!(!check_length(101, 100));
        assert!(check_length(0, 0));
        assert!(!check_length(1, 0));
        assert!(!check_length(1, -2));
    }
}

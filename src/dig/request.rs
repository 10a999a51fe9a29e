//! Parsing of dig requests from HTTP-style parameters.

use super::config::TreeDiggerConfig;
use crate::core::error::DispatchError;
use crate::core::types::{property_types_from_names, validate_limit, PathPattern, PropertyType};

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Request parameters, each name mapped to all of its values.
pub type RequestParams = HashMap<String, Vec<String>>;

/// A fully resolved full-tree dig.
#[derive(Debug, Clone)]
pub struct DigRequest {
    /// Path of the dig root.
    pub path: String,
    /// Pattern a property path has to match.
    pub pattern: PathPattern,
    /// Types of properties to scan.
    pub property_types: BTreeSet<PropertyType>,
    /// Max value length, -1 for unlimited.
    pub max_length: i64,
    /// Max depth below the root, -1 for unlimited.
    pub max_depth: i32,
}

impl DigRequest {
    /// Creates a request for `path` using the configured defaults.
    pub fn new(path: impl Into<String>, defaults: &TreeDiggerConfig) -> Result<Self, DispatchError> {
        Ok(Self {
            path: path.into(),
            pattern: defaults.pattern()?,
            property_types: defaults.property_type_set(),
            max_length: defaults.property_length_max,
            max_depth: defaults.node_depth_max,
        })
    }

    /// Parses `path`, `pattern`, `propertyTypes`, `maxLength` and `maxDepth`.
    ///
    /// Only `path` is mandatory. The others fall back to `defaults`.
    pub fn from_params(params: &RequestParams, defaults: &TreeDiggerConfig) -> Result<Self, DispatchError> {
        let path = first(params, "path")
            .ok_or_else(|| DispatchError::validation("path", "Mandatory parameter path is missing"))?;
        let mut request = Self::new(path, defaults)?;

        if let Some(pattern) = first(params, "pattern") {
            request.pattern = PathPattern::new(pattern)?;
        }

        if let Some(names) = params.get("propertyTypes").filter(|names| !names.is_empty()) {
            request.property_types = property_types_from_names(names)
                .map_err(|_| invalid("propertyTypes", format!("{:?}", names)))?;
        }

        if let Some(value) = first(params, "maxLength") {
            request.max_length = parse_number("maxLength", value)?;
        }

        if let Some(value) = first(params, "maxDepth") {
            request.max_depth = parse_number("maxDepth", value)?;
        }

        validate_limit("maxLength", request.max_length)?;
        validate_limit("maxDepth", i64::from(request.max_depth))?;
        Ok(request)
    }
}

fn first<'a>(params: &'a RequestParams, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|values| values.first()).map(String::as_str)
}

fn parse_number<T: FromStr>(parameter: &str, value: &str) -> Result<T, DispatchError> {
    value.trim().parse().map_err(|_| invalid(parameter, value))
}

fn invalid(parameter: &str, value: impl std::fmt::Display) -> DispatchError {
    DispatchError::validation(parameter, format!("Invalid parameter value for {}: {}", parameter, value))
}

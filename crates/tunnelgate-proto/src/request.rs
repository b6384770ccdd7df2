//! Request parameters handed to the dispatcher
//!
//! The request layer (HTTP, WebSocket upgrade, ...) flattens whatever it
//! received into a multi-valued parameter bag. Only parameter lookup and
//! integer conversion happen here.

use std::collections::HashMap;
use thiserror::Error;

/// Request parameter errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter {name} must be a positive integer, got {value:?}")]
    InvalidInteger { name: String, value: String },
}

/// A tunnel creation request, as a bag of named parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelRequest {
    parameters: HashMap<String, Vec<String>>,
}

impl TunnelRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for the given parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_parameter(name, value);
        self
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// First value of a parameter
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a parameter, in the order they were supplied
    pub fn parameter_values(&self, name: &str) -> Option<&[String]> {
        self.parameters.get(name).map(Vec::as_slice)
    }

    pub fn required_parameter(&self, name: &str) -> Result<&str, RequestError> {
        self.parameter(name)
            .ok_or_else(|| RequestError::MissingParameter(name.to_string()))
    }

    /// Parse an optional positive integer parameter
    ///
    /// Absent parameters yield `Ok(None)`. Present values that are not a
    /// positive decimal integer fail rather than being silently ignored;
    /// surrounding whitespace is not accepted.
    pub fn integer_parameter(&self, name: &str) -> Result<Option<u32>, RequestError> {
        let Some(value) = self.parameter(name) else {
            return Ok(None);
        };

        match value.parse::<u32>() {
            Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
            _ => Err(RequestError::InvalidInteger {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for TunnelRequest
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut request = TunnelRequest::new();
        for (name, value) in iter {
            request.add_parameter(name, value);
        }
        request
    }
}

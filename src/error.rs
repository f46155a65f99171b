// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

/// The result type used throughout the crate.
pub type Fallible<T> = Result<T, ErrorReport>;

/// A human-readable error with an optional underlying cause.
#[derive(Debug)]
pub struct ErrorReport {
    message: String,
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Shorthand for returning an error.
pub fn fail<T>(message: impl Into<String>) -> Fallible<T> {
    Err(ErrorReport::new(message))
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "error: {}", self.message)
    }
}

impl Error for ErrorReport {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn Error + 'static))
    }
}

impl From<std::io::Error> for ErrorReport {
    fn from(err: std::io::Error) -> Self {
        Self::with_cause(err.to_string(), err)
    }
}

impl From<rusqlite::Error> for ErrorReport {
    fn from(err: rusqlite::Error) -> Self {
        Self::with_cause(err.to_string(), err)
    }
}

impl From<serde_json::Error> for ErrorReport {
    fn from(err: serde_json::Error) -> Self {
        Self::with_cause(err.to_string(), err)
    }
}

impl From<toml::de::Error> for ErrorReport {
    fn from(err: toml::de::Error) -> Self {
        Self::with_cause(err.to_string(), err)
    }
}

impl From<reqwest::Error> for ErrorReport {
    fn from(err: reqwest::Error) -> Self {
        Self::with_cause(err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ErrorReport::new("something went wrong.");
        assert_eq!(err.to_string(), "error: something went wrong.");
    }

    #[test]
    fn test_source() {
        let io = std::io::Error::other("disk on fire");
        let err = ErrorReport::with_cause("write failed", io);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_fail() {
        let result: Fallible<()> = fail("nope.");
        assert_eq!(result.unwrap_err().to_string(), "error: nope.");
    }
}

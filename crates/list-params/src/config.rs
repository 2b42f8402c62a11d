//! Configuration for list parameter defaults.

use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE};

/// Defaults applied while parsing pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParamsConfig {
    /// Page number used when `page[number]` is absent or malformed (default: 1).
    #[serde(default = "default_page_number")]
    pub default_page_number: u32,

    /// Page size used when `page[size]` is absent or malformed (default: 20).
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

fn default_page_number() -> u32 {
    DEFAULT_PAGE_NUMBER
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ListParamsConfig {
    fn default() -> Self {
        Self {
            default_page_number: default_page_number(),
            default_page_size: default_page_size(),
        }
    }
}

impl ListParamsConfig {
    /// Load configuration from environment variables.
    ///
    /// - `LIST_PARAMS_DEFAULT_PAGE_NUMBER` (default: 1)
    /// - `LIST_PARAMS_DEFAULT_PAGE_SIZE` (default: 20)
    pub fn from_env() -> Result<Self> {
        let default_page_number = env::var("LIST_PARAMS_DEFAULT_PAGE_NUMBER")
            .unwrap_or_else(|_| DEFAULT_PAGE_NUMBER.to_string())
            .parse()
            .context("LIST_PARAMS_DEFAULT_PAGE_NUMBER must be a valid u32")?;

        let default_page_size = env::var("LIST_PARAMS_DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| DEFAULT_PAGE_SIZE.to_string())
            .parse()
            .context("LIST_PARAMS_DEFAULT_PAGE_SIZE must be a valid u32")?;

        Ok(Self {
            default_page_number,
            default_page_size,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_defaults() {
        let config = ListParamsConfig::default();
        assert_eq!(config.default_page_number, 1);
        assert_eq!(config.default_page_size, 20);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: ListParamsConfig =
            serde_json::from_str(r#"{"default_page_size": 50}"#).unwrap();
        assert_eq!(config.default_page_number, 1);
        assert_eq!(config.default_page_size, 50);
    }
}

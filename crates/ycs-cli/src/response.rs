//! Loading intercepted API responses for the `filter` command

use std::fs;

use reqwest::Client;

/// Where a response body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    File(String),
    Url(String),
}

impl ResponseSource {
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::File(input.to_string())
        }
    }

    /// URL used to decide whether the body belongs to a filtered endpoint.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::File(_) => None,
        }
    }

    pub async fn load(&self, client: &Client) -> Result<String, String> {
        match self {
            Self::File(path) => fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e)),
            Self::Url(url) => {
                log::info!(target: "ycs::members", "Fetching {}", url);
                let response = client
                    .get(url.as_str())
                    .send()
                    .await
                    .map_err(|e| format!("Failed to fetch '{}': {}", url, e))?;
                if !response.status().is_success() {
                    return Err(format!("Fetching '{}' returned {}", url, response.status()));
                }
                response
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read body of '{}': {}", url, e))
            }
        }
    }
}

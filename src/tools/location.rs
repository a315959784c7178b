//! Fixed-location tool.

use async_trait::async_trait;
use serde_json::Value;

use super::Tool;
use crate::config::DEFAULT_LOCATION;

/// Reports a configured location string.
pub struct CurrentLocation {
    location: String,
}

impl CurrentLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl Default for CurrentLocation {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATION)
    }
}

#[async_trait]
impl Tool for CurrentLocation {
    fn name(&self) -> &str {
        "get_current_location_tool"
    }

    fn description(&self) -> &str {
        "Returns the current location as 'City, Country'."
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        Ok(self.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_location_is_chennai() {
        let out = CurrentLocation::default().execute(Value::Null).await.unwrap();
        assert_eq!(out, "Chennai, India");
    }

    #[tokio::test]
    async fn ignores_arguments() {
        let tool = CurrentLocation::new("Lyon, France");
        let out = tool
            .execute(serde_json::json!({"precision": "street"}))
            .await
            .unwrap();
        assert_eq!(out, "Lyon, France");
    }
}

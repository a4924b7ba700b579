//! Abstract model identifiers shared by every provider adapter.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A model as the aggregator names it, independent of any vendor's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Gpt35Turbo16k,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-32k")]
    Gpt4_32k,
    #[serde(rename = "claude-2")]
    Claude2,
    #[serde(rename = "claude-instant")]
    ClaudeInstant,
}

impl ModelType {
    /// Every known model, in display order.
    pub const ALL: [ModelType; 6] = [
        ModelType::Gpt35Turbo,
        ModelType::Gpt35Turbo16k,
        ModelType::Gpt4,
        ModelType::Gpt4_32k,
        ModelType::Claude2,
        ModelType::ClaudeInstant,
    ];

    /// The identifier used on the command line and in serialized requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Gpt35Turbo => "gpt-3.5-turbo",
            ModelType::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
            ModelType::Gpt4 => "gpt-4",
            ModelType::Gpt4_32k => "gpt-4-32k",
            ModelType::Claude2 => "claude-2",
            ModelType::ClaudeInstant => "claude-instant",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when a string names no known model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown model '{0}'")]
pub struct UnknownModel(pub String);

impl FromStr for ModelType {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_model() {
        for model in ModelType::ALL {
            assert_eq!(model.as_str().parse::<ModelType>().unwrap(), model);
        }
    }

    #[test]
    fn test_parse_unknown_model() {
        let err = "gpt-5".parse::<ModelType>().unwrap_err();
        assert_eq!(err, UnknownModel("gpt-5".to_string()));
        assert_eq!(err.to_string(), "Unknown model 'gpt-5'");
    }

    #[test]
    fn test_serde_uses_string_ids() {
        let json = serde_json::to_string(&ModelType::Gpt35Turbo16k).unwrap();
        assert_eq!(json, "\"gpt-3.5-turbo-16k\"");
        let model: ModelType = serde_json::from_str("\"claude-instant\"").unwrap();
        assert_eq!(model, ModelType::ClaudeInstant);
    }
}

//! Canned results shown when the model call fails
//!
//! The visualization pane always gets something renderable: each failure
//! class maps to a fixed flowchart and explanation describing what went wrong.

use super::ClientError;
use crate::types::AnalysisResult;
use strum_macros::{Display, EnumIter};

/// Flowchart shown when the upstream quota or rate limit is exhausted
pub const QUOTA_EXCEEDED_DIAGRAM: &str = "graph TD
    A[Request Sent] --> B{API Quota}
    B -->|Exceeded| C[Rate Limited]
    C --> D[Wait a minute and retry]
    style C fill:#fee2e2,stroke:#ef4444,color:#991b1b";

/// Flowchart shown when the reply could not be parsed
pub const MALFORMED_RESPONSE_DIAGRAM: &str = "graph TD
    A[Model Response] --> B{Valid JSON?}
    B -->|No| C[Could Not Parse Response]
    C --> D[Retry or simplify the code]
    style C fill:#fef3c7,stroke:#f59e0b,color:#92400e";

/// Flowchart shown for every other upstream failure
pub const SYSTEM_BUSY_DIAGRAM: &str = "graph TD
    A[Request Sent] --> B{Service Status}
    B -->|Busy| C[System Under Load]
    C --> D[Retry in a few moments]
    style C fill:#e0e7ff,stroke:#6366f1,color:#3730a3";

const NOT_AVAILABLE: &str = "N/A";

/// Failure classes distinguished by the fallback generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    /// HTTP 429, quota or resource exhaustion
    QuotaExceeded,
    /// The model answered but the reply was not the expected JSON
    MalformedResponse,
    /// Anything else
    SystemBusy,
}

impl FailureClass {
    /// Classify an error by inspecting what the upstream sent back.
    ///
    /// Quota keywords win over everything else so that a rate-limit notice
    /// delivered as a non-JSON reply still reads as a quota problem. Only
    /// upstream text is searched; parser diagnostics carry line and column
    /// numbers that must not count as a status code.
    pub fn classify(error: &ClientError) -> Self {
        let text = match error {
            ClientError::MalformedResponse { preview, .. } => preview.to_lowercase(),
            ClientError::Upstream { status, body } => format!("{status} {body}").to_lowercase(),
            ClientError::Transport(message) => message.to_lowercase(),
            ClientError::MissingApiKey | ClientError::EmptyReply => String::new(),
        };
        if ["429", "quota", "exhausted"]
            .iter()
            .any(|needle| text.contains(needle))
        {
            Self::QuotaExceeded
        } else if matches!(error, ClientError::MalformedResponse { .. }) {
            Self::MalformedResponse
        } else {
            Self::SystemBusy
        }
    }

    pub const fn diagram(self) -> &'static str {
        match self {
            Self::QuotaExceeded => QUOTA_EXCEEDED_DIAGRAM,
            Self::MalformedResponse => MALFORMED_RESPONSE_DIAGRAM,
            Self::SystemBusy => SYSTEM_BUSY_DIAGRAM,
        }
    }

    pub const fn explanation(self) -> &'static str {
        match self {
            Self::QuotaExceeded => {
                "The analysis service has hit its request quota. Wait a minute and try again, \
                 or configure your own API key with `codeflow config --api-key`."
            }
            Self::MalformedResponse => {
                "The model answered, but its reply could not be read as an analysis. \
                 Try again, or trim the snippet down to the part you care about."
            }
            Self::SystemBusy => {
                "The analysis service is under heavy load and could not complete the request. \
                 Try again in a few moments."
            }
        }
    }

    pub const fn optimization_tip(self) -> &'static str {
        match self {
            Self::QuotaExceeded => "Smaller, focused snippets use less of the quota.",
            Self::MalformedResponse => "Shorter inputs produce more reliable replies.",
            Self::SystemBusy => "No suggestions available while the service is busy.",
        }
    }

    /// Build the fallback result for this class
    pub fn result(self) -> AnalysisResult {
        AnalysisResult {
            explanation: self.explanation().to_string(),
            diagram_source: self.diagram().to_string(),
            time_complexity: NOT_AVAILABLE.to_string(),
            space_complexity: NOT_AVAILABLE.to_string(),
            optimization_tip: self.optimization_tip().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_classify_quota_keywords_case_insensitive() {
        let upstream = ClientError::Upstream {
            status: 429,
            body: "Too Many Requests".to_string(),
        };
        assert_eq!(FailureClass::classify(&upstream), FailureClass::QuotaExceeded);

        let transport = ClientError::Transport("RESOURCE_EXHAUSTED".to_string());
        assert_eq!(
            FailureClass::classify(&transport),
            FailureClass::QuotaExceeded
        );

        let malformed = ClientError::MalformedResponse {
            reason: "expected value".to_string(),
            preview: "Quota limit reached".to_string(),
        };
        assert_eq!(
            FailureClass::classify(&malformed),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn test_classify_malformed_and_generic() {
        let malformed = ClientError::MalformedResponse {
            reason: "expected value at line 1 column 1".to_string(),
            preview: "hello".to_string(),
        };
        assert_eq!(
            FailureClass::classify(&malformed),
            FailureClass::MalformedResponse
        );

        let truncated = ClientError::MalformedResponse {
            reason: "EOF while parsing a string at line 1 column 429".to_string(),
            preview: "{\"explanation\": \"aaaa".to_string(),
        };
        assert_eq!(
            FailureClass::classify(&truncated),
            FailureClass::MalformedResponse
        );

        let upstream = ClientError::Upstream {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(FailureClass::classify(&upstream), FailureClass::SystemBusy);
    }

    #[test]
    fn test_every_class_has_distinct_renderable_payload() {
        let results: Vec<_> = FailureClass::iter().map(FailureClass::result).collect();
        for result in &results {
            assert!(result.diagram_source.starts_with("graph TD"));
            assert!(!result.explanation.is_empty());
            assert_eq!(result.time_complexity, "N/A");
        }
        assert_ne!(results[0].diagram_source, results[1].diagram_source);
        assert_ne!(results[1].diagram_source, results[2].diagram_source);
    }
}

//! Analysis result type and terminal formatting

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Everything the model reports about a piece of code.
///
/// Produced either by parsing the model reply or by the fallback generator in
/// [`crate::client::fallback`]. Once built it is shared read-only and replaced
/// wholesale by the next analysis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Plain-language explanation of what the code does
    pub explanation: String,
    /// Mermaid flowchart describing the control flow
    #[serde(rename = "mermaidCode", alias = "diagramSource")]
    pub diagram_source: String,
    /// Big-O time complexity estimate
    pub time_complexity: String,
    /// Big-O space complexity estimate
    pub space_complexity: String,
    /// One concrete suggestion for improving the code
    pub optimization_tip: String,
}

impl AnalysisResult {
    /// Strip a markdown fence the model sometimes wraps around the diagram.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.diagram_source.trim();
        if let Some(body) = trimmed
            .strip_prefix("```mermaid")
            .or_else(|| trimmed.strip_prefix("```"))
        {
            let body = body.strip_suffix("```").unwrap_or(body);
            self.diagram_source = body.trim().to_string();
        } else if trimmed.len() != self.diagram_source.len() {
            self.diagram_source = trimmed.to_string();
        }
        self
    }
}

/// Formats an analysis result as plain text for non-interactive output
pub fn format_analysis(result: &AnalysisResult) -> String {
    let mut out = String::new();

    out.push_str("Explanation\n");
    for line in textwrap::wrap(&result.explanation, 78) {
        out.push_str(&line);
        out.push('\n');
    }

    write!(
        &mut out,
        "\nTime complexity:  {}\nSpace complexity: {}\n",
        result.time_complexity, result.space_complexity
    )
    .expect("write to string should not fail");

    out.push_str("\nOptimization tip\n");
    for line in textwrap::wrap(&result.optimization_tip, 78) {
        out.push_str(&line);
        out.push('\n');
    }

    out.push_str("\nFlowchart\n");
    out.push_str(&result.diagram_source);
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(diagram: &str) -> AnalysisResult {
        AnalysisResult {
            explanation: "Sums a list.".to_string(),
            diagram_source: diagram.to_string(),
            time_complexity: "O(n)".to_string(),
            space_complexity: "O(1)".to_string(),
            optimization_tip: "Use iter().sum().".to_string(),
        }
    }

    #[test]
    fn test_deserializes_wire_keys() {
        let json = r#"{
            "explanation": "e",
            "mermaidCode": "graph TD\nA-->B",
            "timeComplexity": "O(1)",
            "spaceComplexity": "O(1)",
            "optimizationTip": "none"
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).expect("should parse");
        assert_eq!(result.diagram_source, "graph TD\nA-->B");
        assert_eq!(result.optimization_tip, "none");
    }

    #[test]
    fn test_accepts_diagram_source_alias() {
        let json = r#"{"explanation":"e","diagramSource":"graph LR","timeComplexity":"t","spaceComplexity":"s","optimizationTip":"o"}"#;
        let result: AnalysisResult = serde_json::from_str(json).expect("should parse");
        assert_eq!(result.diagram_source, "graph LR");
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"explanation":"e","mermaidCode":"graph LR"}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }

    #[test]
    fn test_normalized_strips_mermaid_fence() {
        let result = sample("```mermaid\ngraph TD\n  A-->B\n```").normalized();
        assert_eq!(result.diagram_source, "graph TD\n  A-->B");

        let untouched = sample("graph TD\n  A-->B").normalized();
        assert_eq!(untouched.diagram_source, "graph TD\n  A-->B");
    }

    #[test]
    fn test_format_analysis_contains_all_sections() {
        let text = format_analysis(&sample("graph TD\n  A-->B"));
        assert!(text.contains("Sums a list."));
        assert!(text.contains("Time complexity:  O(n)"));
        assert!(text.contains("Space complexity: O(1)"));
        assert!(text.contains("Use iter().sum()."));
        assert!(text.ends_with("graph TD\n  A-->B\n"));
    }
}

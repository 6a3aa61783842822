//! Prompts sent to the model

use std::fmt::Write;

/// Default cap on flowchart nodes requested from the model
pub const DEFAULT_MAX_DIAGRAM_NODES: usize = 15;

/// Instruction sent alongside an image for code extraction
pub const OCR_PROMPT: &str = "Extract all source code visible in this image. \
Return only the code exactly as written, with no markdown fences, commentary or explanation.";

/// Build the analysis prompt for a piece of source code
pub fn create_analysis_prompt(source: &str, max_nodes: usize) -> String {
    let mut prompt = String::from(
        "You are an expert software engineer who explains code through flowcharts.\n\
         Analyze the code below and respond with a single JSON object and nothing else.\n\n",
    );

    prompt.push_str("The JSON object must have exactly these string fields:\n");
    prompt.push_str("- \"explanation\": a concise, beginner-friendly explanation of what the code does\n");
    prompt.push_str("- \"mermaidCode\": a Mermaid flowchart (start with `graph TD`) of the control flow\n");
    prompt.push_str("- \"timeComplexity\": the Big-O time complexity, e.g. \"O(n log n)\"\n");
    prompt.push_str("- \"spaceComplexity\": the Big-O space complexity, e.g. \"O(n)\"\n");
    prompt.push_str("- \"optimizationTip\": one concrete suggestion to improve the code\n\n");

    prompt.push_str("Flowchart rules:\n");
    writeln!(
        &mut prompt,
        "- Use at most {max_nodes} nodes. Summarize rather than expand everything."
    )
    .expect("write to string should not fail");
    prompt.push_str(
        "- Represent each loop as a single decision node with a back edge; never unroll iterations.\n",
    );
    prompt.push_str("- Wrap node labels in double quotes when they contain punctuation or brackets.\n");
    prompt.push_str("- Do not wrap the flowchart in markdown fences.\n\n");

    prompt.push_str(
        "If the input is not source code, set \"mermaidCode\" to \
         `graph TD\\n    A[Input] --> B[Not code]` and explain briefly in \"explanation\".\n\n",
    );

    prompt.push_str("Code:\n");
    prompt.push_str(source);
    prompt.push('\n');

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_source_and_node_cap() {
        let prompt = create_analysis_prompt("fn main() {}", 12);
        assert!(prompt.ends_with("Code:\nfn main() {}\n"));
        assert!(prompt.contains("at most 12 nodes"));
        for field in [
            "explanation",
            "mermaidCode",
            "timeComplexity",
            "spaceComplexity",
            "optimizationTip",
        ] {
            assert!(prompt.contains(field), "prompt is missing {field}");
        }
    }
}

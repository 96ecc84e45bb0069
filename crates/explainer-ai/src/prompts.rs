// ABOUTME: Role instructions and request templates for the review and explain stages
// ABOUTME: Instruction-formatted ([INST]) for CodeLlama instruct models

/// System instructions for the Explainer role
pub const EXPLAINER_SYSTEM_PROMPT: &str = "\
[INST] You are a Python code explainer specializing in algorithms and data structures.

For each code snippet, provide a clear explanation following this structure:
1. Purpose and Overview: What the code does and its main goal
2. Algorithm Explanation: How the algorithm works step by step
3. Key Components: Important variables, functions, and their roles
4. Time and Space Complexity: Big O analysis
5. Example Execution Flow: How data flows through the code

Use clear, technical language but make it understandable.
If you receive clarification points, address them in your explanation.
Focus on both theoretical understanding and practical implementation.

Respond ONLY with the explanation. [/INST]";

/// System instructions for the Reviewer role
pub const REVIEWER_SYSTEM_PROMPT: &str = "\
[INST] You are a Python code reviewer specializing in algorithms and data structures.

For each code snippet, analyze:
1. Algorithm implementation details
2. Variable naming and usage
3. Edge cases and boundary conditions
4. Performance considerations
5. Potential improvements

Format output as bullet points. Be specific and technical.
Example:
• Explain the choice of mid = low + (high - low)//2 vs (low + high)//2
• Note how edge cases are handled when target is not found
• Consider time complexity for different input sizes

If code is straightforward, say: \"Implementation is clear and follows standard practices.\" [/INST]";

/// Render the Stage 1 (review) request.
///
/// The snippet is embedded verbatim inside a fenced block. Fence markers in the
/// snippet itself are not escaped.
pub fn build_review_prompt(snippet: &str) -> String {
    format!(
        "[INST] You are a Python code reviewer. Review this code and list any parts that need clarification:

```python
{snippet}
```

Focus on:
1. Algorithm logic
2. Variable usage
3. Edge cases
4. Performance considerations

List your findings as bullet points. If the code is clear, state that it's straightforward. [/INST]"
    )
}

/// Render the Stage 2 (explain) request from the snippet and the review output.
pub fn build_explanation_prompt(snippet: &str, clarification: &str) -> String {
    format!(
        "[INST] You are a Python code explainer. Explain this code clearly and comprehensively:

```python
{snippet}
```

Consider these points from the code review:
{clarification}

Provide your explanation in this structure:
1. Purpose and Overview
2. Algorithm Explanation
3. Key Components
4. Time and Space Complexity
5. Example Execution Flow

Make it clear and detailed. [/INST]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNIPPET: &str = "def f(x): return x+1";

    #[test]
    fn test_review_prompt_embeds_snippet_in_fence() {
        let prompt = build_review_prompt(SNIPPET);
        assert!(prompt.starts_with("[INST]"));
        assert!(prompt.ends_with("[/INST]"));
        assert!(prompt.contains("```python\ndef f(x): return x+1\n```"));
    }

    #[test]
    fn test_explanation_prompt_threads_review_output() {
        let prompt = build_explanation_prompt(SNIPPET, "• x is never validated");
        assert!(prompt.contains(SNIPPET));
        assert!(prompt.contains(
            "Consider these points from the code review:\n• x is never validated"
        ));
        assert!(prompt.contains("5. Example Execution Flow"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        assert_eq!(build_review_prompt(SNIPPET), build_review_prompt(SNIPPET));
        assert_eq!(
            build_explanation_prompt(SNIPPET, "ok"),
            build_explanation_prompt(SNIPPET, "ok")
        );
    }

    #[test]
    fn test_fence_markers_in_snippet_are_kept_verbatim() {
        let snippet = "s = '```'\n[/INST]";
        let prompt = build_review_prompt(snippet);
        assert!(prompt.contains(snippet));
    }

    #[test]
    fn test_role_prompts_use_instruct_format() {
        for prompt in [EXPLAINER_SYSTEM_PROMPT, REVIEWER_SYSTEM_PROMPT] {
            assert!(prompt.starts_with("[INST]"));
            assert!(prompt.ends_with("[/INST]"));
        }
    }
}

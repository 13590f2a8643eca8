use log::debug;

const ANALYSIS_TEMPLATE: &str = r#"You are an expert English language analyzer. Analyze the following text and identify ALL ${checks}.

CRITICAL REQUIREMENTS:
1. Find EVERY error - be thorough and comprehensive
2. Return ONLY valid JSON - no explanations, no markdown, no other text
3. If no errors exist, return an empty array []
4. Each error must include exact position in the text

OUTPUT FORMAT (JSON array):
[
  {
    "word": "exact text as it appears",
    "position": start_index,
    "endPosition": end_index,
    "type": "spelling" or "grammar",
    "suggestions": ["correction1", "correction2"]
  }
]

RULES:
- Ignore: code, URLs, file paths, variable names, function names, JSON keys
- Focus only on human-readable text content
- Report each error exactly as it appears
- Position indices start at 0

TEXT TO ANALYZE:
---
${text}
---

Return ONLY the JSON array:"#;

/// Builds the instruction sent to the model for one page of text.
///
/// Callers reject the case where both checks are disabled before getting here.
pub fn build_analysis_prompt(text: &str, spell_enabled: bool, grammar_enabled: bool) -> String {
    let mut checks = Vec::new();
    if spell_enabled {
        checks.push("spelling errors");
    }
    if grammar_enabled {
        checks.push("grammar errors");
    }

    // Text goes in last so a page containing "${checks}" is left alone.
    let prompt = ANALYSIS_TEMPLATE
        .replace("${checks}", &checks.join(" and "))
        .replace("${text}", text);
    debug!("Built analysis prompt: {} chars", prompt.len());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_enabled_checks() {
        let both = build_analysis_prompt("Hello", true, true);
        assert!(both.contains("identify ALL spelling errors and grammar errors."));

        let spell = build_analysis_prompt("Hello", true, false);
        assert!(spell.contains("identify ALL spelling errors."));
        assert!(!spell.contains("grammar errors."));

        let grammar = build_analysis_prompt("Hello", false, true);
        assert!(grammar.contains("identify ALL grammar errors."));
    }

    #[test]
    fn test_prompt_embeds_text_verbatim() {
        let text = "I recieved your mesage.\n\nPrice: ${checks}";
        let prompt = build_analysis_prompt(text, true, true);
        assert!(prompt.contains(&format!("---\n{}\n---", text)));
        assert!(prompt.ends_with("Return ONLY the JSON array:"));
    }
}

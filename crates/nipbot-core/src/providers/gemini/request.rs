//! Gemini request body construction.

use serde_json::{Value, json};

use crate::providers::HistoryEntry;

/// Per-request generation settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// Attach the `google_search` tool so answers are grounded in web results.
    pub web_search: bool,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Builds the `contents` array from the conversation history.
///
/// Entries with blank text are skipped; the API rejects empty parts.
pub fn build_contents(history: &[HistoryEntry]) -> Vec<Value> {
    history
        .iter()
        .filter(|entry| !entry.text.trim().is_empty())
        .map(|entry| {
            json!({
                "role": entry.role.as_str(),
                "parts": [{ "text": entry.text }],
            })
        })
        .collect()
}

/// Builds a `streamGenerateContent` request body.
pub fn build_gemini_request(
    history: &[HistoryEntry],
    system: Option<&str>,
    options: &GenerationOptions,
) -> Value {
    let mut request = json!({
        "contents": build_contents(history),
    });

    if let Some(prompt) = system
        && !prompt.trim().is_empty()
    {
        request["system_instruction"] = json!({
            "parts": [{"text": prompt}]
        });
    }

    if options.web_search {
        request["tools"] = json!([{ "google_search": {} }]);
    }

    let mut generation_config = json!({});
    if let Some(max_tokens) = options.max_output_tokens
        && max_tokens > 0
    {
        generation_config["maxOutputTokens"] = json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        generation_config["temperature"] = json!(temperature);
    }

    // Only add generationConfig if it has content
    if generation_config.as_object().is_some_and(|o| !o.is_empty()) {
        request["generationConfig"] = generation_config;
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_maps_roles_and_system_instruction() {
        let history = vec![
            HistoryEntry::user("BCG는 언제 맞나요?"),
            HistoryEntry::model("생후 4주 이내입니다."),
            HistoryEntry::user("부작용은?"),
        ];
        let request = build_gemini_request(&history, Some("You are NIP bot"), &GenerationOptions::default());

        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "부작용은?");
        assert_eq!(
            request["system_instruction"]["parts"][0]["text"],
            "You are NIP bot"
        );
        assert!(request.get("tools").is_none());
        assert!(request.get("generationConfig").is_none());
    }

    #[test]
    fn test_build_request_with_search_and_generation_config() {
        let options = GenerationOptions {
            web_search: true,
            max_output_tokens: Some(2048),
            temperature: Some(0.5),
        };
        let request = build_gemini_request(&[HistoryEntry::user("hi")], None, &options);

        assert_eq!(request["tools"], json!([{ "google_search": {} }]));
        assert_eq!(request["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(request["generationConfig"]["temperature"], 0.5);
        assert!(request.get("system_instruction").is_none());
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let history = vec![HistoryEntry::model("  "), HistoryEntry::user("질문")];
        assert_eq!(build_contents(&history).len(), 1);
    }
}

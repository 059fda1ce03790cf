//! Construction of tag-suggestion requests and strict parsing of replies.
//!
//! The model is asked to answer only by calling a single declared function,
//! `handleTagSuggestions`, whose one required parameter is an array of tag
//! strings. Replies that do not carry that call are protocol errors, never an
//! empty success.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::client::LlmError;

/// Name of the only function the model may call.
pub const FUNCTION_NAME: &str = "handleTagSuggestions";

const SYSTEM_PROMPT: &str = "You are a backend multilingual tag suggestion module. Your only job is to analyze the semantic content of user-provided text and always return your results by calling the `handleTagSuggestions` function. Never output tags or any explanations directly to the chat. Always extract at least 5 and at most 15 concise, relevant tags for each text, following these rules: - Tags must accurately represent the main topics, entities (names, places, organizations), and semantic themes of the input text. - Tags should use the same language as the input text whenever possible. - Tags should be lowercase and use underscores instead of spaces or special symbols. - Do not generate redundant, repetitive, or overly similar tags. - For long texts, summarize the main topics and entities first, then generate tags based on your summary. - Only respond by calling the function, never as plain text.";

const USER_INSTRUCTION: &str = "Analyze the following text and suggest 5-15 high-quality tags, using the language of the input. Consider the provided existing tags if relevant.";

const FUNCTION_DESCRIPTION: &str = "This function receives a list of tags that best describe the user-provided input text for categorization, search, or semantic linking. Tags should be concise, use lowercase letters and underscores, and match the language of the input text. Tags must not be redundant or overly similar. Always return at least 5 and at most 15 tags.";

const TAGS_PARAMETER_DESCRIPTION: &str = "An array of tags (utf8 unicode strings) representing the main topics, entities, and semantic meaning of the input text. Tags should use only lowercase letters and underscores, with no spaces or special symbols.";

/// Text to tag, plus tags that already exist for context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSuggestionRequest {
    /// Input text, frontmatter already removed
    pub text: String,
    pub known_tags: Vec<String>,
}

impl TagSuggestionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            known_tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_known_tags(mut self, known_tags: Vec<String>) -> Self {
        self.known_tags = known_tags;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Declaration of a callable function in the chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCallChoice {
    pub name: &'static str,
}

/// Body of `POST {base}/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub temperature: f64,
    pub messages: Vec<ChatMessage>,
    pub functions: Vec<FunctionDefinition>,
    pub function_call: FunctionCallChoice,
}

impl ChatCompletionRequest {
    pub fn new(
        model: impl Into<String>,
        request: &TagSuggestionRequest,
        temperature: f64,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature,
            messages: build_messages(request),
            functions: vec![tag_function()],
            function_call: FunctionCallChoice {
                name: FUNCTION_NAME,
            },
        }
    }
}

/// JSON schema of the function's parameters: an object with a required
/// `tags` array of strings.
pub fn tags_parameter_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tags": {
                "type": "array",
                "description": TAGS_PARAMETER_DESCRIPTION,
                "items": { "type": "string" }
            }
        },
        "required": ["tags"]
    })
}

pub fn tag_function() -> FunctionDefinition {
    FunctionDefinition {
        name: FUNCTION_NAME,
        description: FUNCTION_DESCRIPTION,
        parameters: tags_parameter_schema(),
    }
}

/// Builds the user message: the fixed instruction, the delimited input text
/// and the delimited known tags.
///
/// Known tags are deduplicated (first occurrence kept) to keep the prompt
/// compact; vault-wide collections repeat tags across documents.
pub fn user_prompt(request: &TagSuggestionRequest) -> String {
    let mut seen = std::collections::HashSet::new();
    let known: Vec<&str> = request
        .known_tags
        .iter()
        .map(String::as_str)
        .filter(|tag| !tag.is_empty() && seen.insert(*tag))
        .collect();

    format!(
        "{USER_INSTRUCTION} <text>\n{}\n</text> <existingTags>\n{}\n</existingTags>",
        request.text,
        known.join(", ")
    )
}

pub fn build_messages(request: &TagSuggestionRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(request)),
    ]
}

/// Parses a chat-completion reply into raw tags.
///
/// # Errors
///
/// - `LlmError::Api` when the payload carries an `error` object
/// - `LlmError::Http` for other non-200 statuses
/// - `LlmError::Protocol` when the body is not JSON, the function call is
///   missing, or its arguments lack a `tags` array
pub fn parse_chat_completion(status: u16, body: &str) -> Result<Vec<String>, LlmError> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) if status == 200 => {
            return Err(LlmError::Protocol(format!("response is not valid JSON: {e}")));
        }
        Err(_) => {
            return Err(LlmError::Http {
                status,
                body: body.to_string(),
            });
        }
    };

    if let Some(error) = api_error(&json) {
        return Err(error);
    }

    if status != 200 {
        return Err(LlmError::Http {
            status,
            body: body.to_string(),
        });
    }

    let arguments = json
        .pointer("/choices/0/message/function_call/arguments")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            LlmError::Protocol(format!(
                "response does not contain a '{FUNCTION_NAME}' function call"
            ))
        })?;

    parse_tag_arguments(arguments)
}

/// Decodes the function-call arguments string into raw tags.
///
/// Entries of the `tags` array that are not strings are skipped.
///
/// # Examples
///
/// ```
/// use autotag::llm::parse_tag_arguments;
///
/// let tags = parse_tag_arguments(r#"{"tags": ["paris", 3, "france"]}"#).unwrap();
/// assert_eq!(tags, vec!["paris", "france"]);
///
/// assert!(parse_tag_arguments(r#"{"labels": []}"#).is_err());
/// ```
pub fn parse_tag_arguments(arguments: &str) -> Result<Vec<String>, LlmError> {
    let value: Value = serde_json::from_str(arguments).map_err(|e| {
        LlmError::Protocol(format!("function call arguments are not valid JSON: {e}"))
    })?;

    let tags = value
        .get("tags")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            LlmError::Protocol("function call arguments are missing a 'tags' array".to_string())
        })?;

    Ok(tags
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// Extracts an API-level error from a reply payload.
///
/// Accepts both the `{"error": {"type", "message"}}` shape of hosted APIs and
/// the `{"error": "message"}` shape of local servers.
pub(crate) fn api_error(json: &Value) -> Option<LlmError> {
    match json.get("error")? {
        Value::Object(error) => Some(LlmError::Api {
            kind: error
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
        Value::String(message) => Some(LlmError::Api {
            kind: None,
            message: message.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion_with_arguments(arguments: &str) -> String {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": FUNCTION_NAME,
                        "arguments": arguments
                    }
                },
                "finish_reason": "function_call"
            }]
        })
        .to_string()
    }

    #[test]
    fn test_user_prompt_delimits_text_and_known_tags() {
        let request = TagSuggestionRequest::new("The Eiffel Tower is in Paris, France.")
            .with_known_tags(vec![
                "travel".to_string(),
                "europe".to_string(),
                "travel".to_string(),
            ]);

        let prompt = user_prompt(&request);
        assert!(prompt.starts_with(USER_INSTRUCTION));
        assert!(prompt.contains("<text>\nThe Eiffel Tower is in Paris, France.\n</text>"));
        assert!(prompt.contains("<existingTags>\ntravel, europe\n</existingTags>"));
    }

    #[test]
    fn test_request_body_declares_single_forced_function() {
        let request = TagSuggestionRequest::new("text");
        let body = ChatCompletionRequest::new("gpt-4o-mini", &request, 0.2, None);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["functions"].as_array().unwrap().len(), 1);
        assert_eq!(json["functions"][0]["name"], FUNCTION_NAME);
        assert_eq!(json["functions"][0]["parameters"]["required"], json!(["tags"]));
        assert_eq!(
            json["functions"][0]["parameters"]["properties"]["tags"]["items"]["type"],
            "string"
        );
        assert_eq!(json["function_call"], json!({ "name": FUNCTION_NAME }));
    }

    #[test]
    fn test_max_tokens_serialized_when_set() {
        let request = TagSuggestionRequest::new("text");
        let body = ChatCompletionRequest::new("gpt-4o-mini", &request, 0.9, Some(256));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn test_parses_function_call_arguments() {
        let body = completion_with_arguments(r#"{"tags": ["eiffel_tower", "paris"]}"#);
        let tags = parse_chat_completion(200, &body).unwrap();
        assert_eq!(tags, vec!["eiffel_tower", "paris"]);
    }

    #[test]
    fn test_missing_function_call_is_protocol_error() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "paris, france" } }]
        })
        .to_string();

        let err = parse_chat_completion(200, &body).unwrap_err();
        assert!(matches!(err, LlmError::Protocol(_)));
    }

    #[test]
    fn test_malformed_arguments_are_protocol_errors() {
        let not_json = completion_with_arguments("tags: paris");
        assert!(matches!(
            parse_chat_completion(200, &not_json),
            Err(LlmError::Protocol(_))
        ));

        let wrong_shape = completion_with_arguments(r#"{"tags": "paris"}"#);
        assert!(matches!(
            parse_chat_completion(200, &wrong_shape),
            Err(LlmError::Protocol(_))
        ));
    }

    #[test]
    fn test_non_json_body_with_ok_status_is_protocol_error() {
        assert!(matches!(
            parse_chat_completion(200, "<html>gateway</html>"),
            Err(LlmError::Protocol(_))
        ));
    }

    #[test]
    fn test_api_error_object_is_surfaced() {
        let body = json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })
        .to_string();

        match parse_chat_completion(401, &body).unwrap_err() {
            LlmError::Api { kind, message } => {
                assert_eq!(kind.as_deref(), Some("invalid_request_error"));
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_200_without_error_object_is_http_error() {
        assert!(matches!(
            parse_chat_completion(502, "Bad Gateway"),
            Err(LlmError::Http { status: 502, .. })
        ));
        assert!(matches!(
            parse_chat_completion(500, "{}"),
            Err(LlmError::Http { status: 500, .. })
        ));
    }

    #[test]
    fn test_string_error_shape_is_supported() {
        let json = json!({ "error": "model 'llama9' not found" });
        match api_error(&json) {
            Some(LlmError::Api { kind: None, message }) => {
                assert_eq!(message, "model 'llama9' not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}

//! Helpers for building `CallToolResult` responses

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;

/// Successful response carrying pretty-printed JSON
///
/// Clients decode JSON text back into structured values, so tools that
/// return application state should prefer this over [`text_success`].
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Successful plain text response
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Application-level failure reported as a tool result (`is_error = true`)
///
/// Unlike returning `Err(McpError)`, the message reaches the model as
/// ordinary tool output.
pub fn error_text(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Layer {
        name: String,
        opacity: f32,
    }

    #[test]
    fn test_json_success() {
        let layer = Layer {
            name: "Background".to_string(),
            opacity: 1.0,
        };
        let result = json_success(&layer).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_text_success() {
        let result = text_success("done");
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_error_text_sets_flag() {
        let result = error_text("no such object");
        assert_eq!(result.is_error, Some(true));
    }
}

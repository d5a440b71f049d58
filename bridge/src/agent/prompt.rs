//! System preamble
//!
//! Sent as the system prompt on every step: the caller's base prompt, the
//! catalogue of tools across all connected servers and, when one has been
//! supplied, a JSON snapshot of application state.

use serde_json::Value;

use crate::mcp::ToolRegistry;

pub fn build_preamble(
    base_prompt: Option<&str>,
    registry: &ToolRegistry,
    snapshot: Option<&Value>,
) -> Option<String> {
    let mut sections = Vec::new();

    if let Some(base) = base_prompt.map(str::trim).filter(|b| !b.is_empty()) {
        sections.push(base.to_string());
    }

    let tools = registry.all();
    if !tools.is_empty() {
        let mut catalogue = String::from("Available tools:");
        for tool in tools {
            catalogue.push_str(&format!("\n- {} [{}]", tool.name, tool.owning_server));
            let description = tool.description.lines().next().unwrap_or_default().trim();
            if !description.is_empty() {
                catalogue.push_str(": ");
                catalogue.push_str(description);
            }
        }
        sections.push(catalogue);
    }

    if let Some(snapshot) = snapshot {
        let rendered =
            serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| snapshot.to_string());
        sections.push(format!("Current application state:\n{}", rendered));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

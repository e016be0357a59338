//! Prompt text and response schemas sent to the generation service.

use serde_json::{Value, json};

use crate::models::{AppPlan, ChatMessage, ENTRY_POINT};

/// Build the planning prompt for a free-form site idea.
pub fn plan_prompt(idea: &str) -> String {
    format!(
        r#"You are a product manager and UI/UX designer. A user wants a website:

"{idea}"

Produce a short, hosting-friendly project name (lowercase words separated by dashes)
and a detailed, engaging description of the website expanded from the user's idea.
The description should be a few sentences long and mention the sections, tone and
color scheme the site should have. Respond with JSON only."#
    )
}

/// Build the file-generation prompt from the (possibly edited) description.
pub fn files_prompt(description: &str) -> String {
    format!(
        r#"You are a senior frontend developer. Build a complete static website for:

"{description}"

Instructions:
1. Return every file the site needs as a JSON object {{"files": [{{"name", "content"}}]}}.
2. The site root MUST be a file named "{ENTRY_POINT}".
3. Put styles and scripts in separate files (e.g. style.css, script.js) referenced with
   relative paths from {ENTRY_POINT}.
4. The site must be modern, responsive and accessible, with realistic placeholder content.
5. File contents are raw source. Do not wrap them in markdown fences."#
    )
}

/// Build the revision prompt from the plan, current document and chat history.
pub fn revision_prompt(plan: &AppPlan, current_content: &str, history: &[ChatMessage]) -> String {
    let history_text = history
        .iter()
        .map(|msg| format!("{}: {}", msg.sender, msg.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an assistant helping a user improve their website.

Website: {name}
Description: {description}

Current {ENTRY_POINT}:
{current_content}

Chat history:
{history_text}

The last user message is a request. If it asks for a change that can be made to the
page, respond with kind "document" and the FULL new {ENTRY_POINT} as content.
If it is a question or asks for ideas, respond with kind "message" and a concise answer
as content."#,
        name = plan.name,
        description = plan.description,
    )
}

pub fn plan_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": {
                "type": "STRING",
                "description": "Short project name, lowercase words separated by dashes."
            },
            "description": {
                "type": "STRING",
                "description": "Detailed description of the website, a few sentences long."
            }
        },
        "required": ["name", "description"]
    })
}

pub fn files_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "files": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "content": { "type": "STRING" }
                    },
                    "required": ["name", "content"]
                }
            }
        },
        "required": ["files"]
    })
}

pub fn revision_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "kind": { "type": "STRING", "enum": ["document", "message"] },
            "content": { "type": "STRING" }
        },
        "required": ["kind", "content"]
    })
}

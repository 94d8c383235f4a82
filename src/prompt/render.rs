//! Prompt Renderer - Render templates with context variables using Handlebars

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{Result, TaskloopError};

/// Placeholder values handed to a loop prompt.
///
/// Field names serialize to the camelCase placeholders the templates use
/// (`{{todoPath}}`, `{{claudiomiroFolder}}`, ...). Paths are absolute.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    pub task_id: String,
    pub iteration: u32,
    /// A number, or "unbounded"
    pub max_iterations: String,
    pub user_prompt: String,
    pub todo_path: String,
    /// Alias of `todo_path` used by review templates
    pub bugs_path: String,
    pub overview_path: String,
    pub passed_path: String,
    pub failed_path: String,
    pub research_path: String,
    pub claudiomiro_folder: String,
    pub task_folder: String,
    pub previous_findings: String,
    pub force_research: bool,
    pub scope: String,
    pub pending_count: usize,
    pub completed_count: usize,
}

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a new PromptRenderer with default settings
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are markdown, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| TaskloopError::InvalidState(format!("Failed to render template: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_placeholders() {
        let renderer = PromptRenderer::new();
        let context = PromptContext {
            iteration: 2,
            max_iterations: "5".to_string(),
            user_prompt: "Fix the parser".to_string(),
            todo_path: "/repo/.taskloop/T1/TODO.md".to_string(),
            claudiomiro_folder: "/repo/.taskloop".to_string(),
            ..Default::default()
        };

        let template = "{{iteration}}/{{maxIterations}} {{userPrompt}} {{todoPath}} {{claudiomiroFolder}}";
        let result = renderer.render_with(template, &context).unwrap();
        assert_eq!(result, "2/5 Fix the parser /repo/.taskloop/T1/TODO.md /repo/.taskloop");
    }

    #[test]
    fn test_render_no_escape() {
        let renderer = PromptRenderer::new();
        let context = PromptContext {
            user_prompt: "<b>a & b</b>".to_string(),
            ..Default::default()
        };
        let result = renderer.render_with("{{userPrompt}}", &context).unwrap();
        assert_eq!(result, "<b>a & b</b>");
    }

    #[test]
    fn test_render_conditional_sections() {
        let renderer = PromptRenderer::new();
        let template = "{{#if forceResearch}}RESEARCH AGAIN{{/if}}{{#if previousFindings}}\n{{previousFindings}}{{/if}}";

        let quiet = renderer.render_with(template, &PromptContext::default()).unwrap();
        assert_eq!(quiet, "");

        let context = PromptContext {
            force_research: true,
            previous_findings: "- missing test".to_string(),
            ..Default::default()
        };
        let loud = renderer.render_with(template, &context).unwrap();
        assert_eq!(loud, "RESEARCH AGAIN\n- missing test");
    }

    #[test]
    fn test_render_missing_variable_is_empty() {
        let renderer = PromptRenderer::new();
        let result = renderer.render_with("[{{nothing}}]", &PromptContext::default()).unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn test_render_invalid_template() {
        let renderer = PromptRenderer::new();
        assert!(renderer.render_with("{{#if forceResearch}}open", &PromptContext::default()).is_err());
    }
}

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use validator::Validate;

use super::ids::{SystemPromptId, TaskTemplateId};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*(.+?)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Substitute `{{name}}` placeholders with values from `variables`.
///
/// The name is everything between the braces minus surrounding whitespace,
/// so keys may contain spaces or non-ASCII letters. Placeholders without a
/// supplied value are left in the output untouched.
pub fn render_prompt(template: &str, variables: &HashMap<String, String>) -> String {
    if variables.is_empty() {
        return template.to_string();
    }

    placeholder_pattern()
        .replace_all(template, |caps: &Captures<'_>| match variables.get(caps[1].trim()) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

// ===== Task Template =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: TaskTemplateId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub prompt_template: String,
    pub created_at: DateTime<Utc>,
}

impl TaskTemplate {
    pub fn new(name: String, prompt_template: String) -> Self {
        Self {
            id: TaskTemplateId::new(),
            name,
            prompt_template,
            created_at: Utc::now(),
        }
    }

    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        render_prompt(&self.prompt_template, variables)
    }
}

// ===== System Prompt =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SystemPrompt {
    pub id: SystemPromptId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SystemPrompt {
    pub fn new(name: String, content: String) -> Self {
        Self {
            id: SystemPromptId::new(),
            name,
            content,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_known_variables() {
        let rendered = render_prompt(
            "Summarize {{topic}} for a {{audience}}.",
            &vars(&[("topic", "borrowing"), ("audience", "beginner")]),
        );
        assert_eq!(rendered, "Summarize borrowing for a beginner.");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let rendered = render_prompt("{{known}} and {{unknown}}", &vars(&[("known", "x")]));
        assert_eq!(rendered, "x and {{unknown}}");
    }

    #[test]
    fn test_render_tolerates_inner_whitespace() {
        let rendered = render_prompt("Hi {{ name }}!", &vars(&[("name", "Ada")]));
        assert_eq!(rendered, "Hi Ada!");
    }

    #[test]
    fn test_render_keys_with_spaces_and_accents() {
        let rendered = render_prompt(
            "Hi {{user name}}, talk about {{ thème }}.",
            &vars(&[("user name", "Ada"), ("thème", "rust")]),
        );
        assert_eq!(rendered, "Hi Ada, talk about rust.");
    }

    #[test]
    fn test_render_adjacent_placeholders_stay_separate() {
        let rendered = render_prompt("{{a}}{{b}} {{}}", &vars(&[("a", "1"), ("b", "2")]));
        assert_eq!(rendered, "12 {{}}");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let rendered = render_prompt("{{a}}-{{a}}", &vars(&[("a", "1")]));
        assert_eq!(rendered, "1-1");
    }

    #[test]
    fn test_render_without_variables_is_identity() {
        let template = "Plain {{prompt}}";
        assert_eq!(render_prompt(template, &HashMap::new()), template);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let rendered = render_prompt("{{a}}", &vars(&[("a", "{{b}}"), ("b", "nope")]));
        assert_eq!(rendered, "{{b}}");
    }

    #[test]
    fn test_task_template_render() {
        let template = TaskTemplate::new("qa".to_string(), "Q: {{question}}".to_string());
        assert_eq!(template.render(&vars(&[("question", "why?")])), "Q: why?");
    }
}

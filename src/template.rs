//! Message body templates for the destinations that take free-form text.

use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;

/// HTML body of notification emails. Values are HTML-escaped.
pub const EMAIL_TEMPLATE: &str = "email.html";
/// Jira wiki-markup issue description.
pub const JIRA_TEMPLATE: &str = "jira.txt";
/// GitHub markdown issue body.
pub const GITHUB_TEMPLATE: &str = "github.md";
/// Plain-text alert description for Opsgenie.
pub const OPSGENIE_TEMPLATE: &str = "opsgenie.txt";

const TEMPLATES: [(&str, &str); 4] = [
    (
        EMAIL_TEMPLATE,
        "<h2>Message</h2><a href='{{ url }}'>{{ summary }}</a><br>\
         <h2>Severity</h2>{{ severity }}<br>\
         <h2>Runbook</h2>{{ runbook }}<br>\
         <h2>Description</h2>{{ description }}",
    ),
    (
        JIRA_TEMPLATE,
        "*Description:* {{ description }}\n \
         [Click here to view the alert]({{ url }})\n \
         *Runbook:* {{ runbook }}\n \
         *Severity:* {{ severity }}\n \
         *Tags:* {{ tags | join(\", \") }}",
    ),
    (
        GITHUB_TEMPLATE,
        "**Description:** {{ description }}\n \
         [Click here to view the alert]({{ url }})\n \
         **Runbook:** {{ runbook }}\n \
         **Severity:** {{ severity }}\n \
         **Tags:** {{ tags | join(\", \") }}",
    ),
    (
        OPSGENIE_TEMPLATE,
        "{{ description }}\nRunbook: {{ runbook }}\nSeverity: {{ severity }}\nLink: {{ url }}",
    ),
];

/// A service for rendering the built-in message templates.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// An error occurred while loading or rendering a template.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

impl TemplateService {
    /// Loads the built-in templates. Rendering fails on undefined variables
    /// rather than printing them empty.
    pub fn new() -> Result<Self, TemplateServiceError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Renders the named template with the given context.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, TemplateServiceError> {
        let rendered = self.env.get_template(name).and_then(|t| t.render(context));
        rendered.map_err(|e| {
            tracing::warn!(template = name, error = %e, "Failed to render template.");
            TemplateServiceError::RenderError(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context() -> serde_json::Value {
        json!({
            "summary": "Root Login failed",
            "url": "https://example.com/alerts/R1-1",
            "severity": "HIGH",
            "runbook": "Rotate keys",
            "description": "Root <b>login</b>",
            "tags": ["aws", "iam"],
        })
    }

    #[test]
    fn test_email_template_escapes_html() {
        let service = TemplateService::new().unwrap();
        let body = service.render(EMAIL_TEMPLATE, context()).unwrap();

        assert!(body.starts_with("<h2>Message</h2><a href='"));
        assert!(body.contains(">Root Login failed</a><br>"));
        assert!(body.contains("<h2>Severity</h2>HIGH<br>"));
        assert!(body.contains("Root &lt;b&gt;login"));
        assert!(!body.contains("<b>login"));
    }

    #[test]
    fn test_jira_template() {
        let service = TemplateService::new().unwrap();
        let body = service.render(JIRA_TEMPLATE, context()).unwrap();
        assert_eq!(
            body,
            "*Description:* Root <b>login</b>\n \
             [Click here to view the alert](https://example.com/alerts/R1-1)\n \
             *Runbook:* Rotate keys\n *Severity:* HIGH\n *Tags:* aws, iam"
        );
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let service = TemplateService::new().unwrap();
        let result = service.render(GITHUB_TEMPLATE, json!({ "description": "d" }));
        assert!(matches!(result, Err(TemplateServiceError::RenderError(_))));
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let service = TemplateService::new().unwrap();
        assert!(service.render("slack.json", context()).is_err());
    }
}

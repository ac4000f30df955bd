use std::collections::HashMap;

use serde_json::Value;
use stately_core::{ConfigurationError, TemplateRenderer};

use crate::error::EngineError;

/// Render one template, attributing failures to the calling hook.
pub(crate) fn render_template(
    renderer: &dyn TemplateRenderer,
    model: &Value,
    template: &str,
    hook: &'static str,
) -> Result<String, EngineError> {
    renderer
        .render(template, model)
        .map_err(|e| ConfigurationError::new(hook, e.to_string()).into())
}

/// Render a context name; a blank result is a configuration error.
pub(crate) fn render_context_name(
    renderer: &dyn TemplateRenderer,
    model: &Value,
    template: &str,
    hook: &'static str,
) -> Result<String, EngineError> {
    let name = render_template(renderer, model, template, hook)?;
    if name.trim().is_empty() {
        return Err(ConfigurationError::new(hook, "context cannot be blank").into());
    }
    Ok(name)
}

/// Render every value of a key -> template map.
pub(crate) fn render_map(
    renderer: &dyn TemplateRenderer,
    model: &Value,
    configuration: &HashMap<String, String>,
    hook: &'static str,
) -> Result<HashMap<String, String>, EngineError> {
    configuration
        .iter()
        .map(|(key, template)| {
            Ok((
                key.clone(),
                render_template(renderer, model, template, hook)?,
            ))
        })
        .collect()
}

use serde_json::{Map, Value};

use crate::errors::TemplateError;

/// External templating capability. The host owns the real template language;
/// this crate only needs "string in, string out" against a JSON model.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, model: &Value) -> Result<String, TemplateError>;
}

/// Assemble the render model handed to hooks for one served request.
pub fn serve_model(request: Value, response: Value) -> Value {
    let mut model = Map::new();
    model.insert("request".to_string(), request);
    model.insert("response".to_string(), response);
    Value::Object(model)
}

/// Matcher-clause configuration, viewed structurally. Rendering recurses over
/// this shape instead of inspecting JSON types at every call site.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Scalar(String),
    Sequence(Vec<ConfigValue>),
    Mapping(Vec<(String, ConfigValue)>),
}

impl ConfigValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                Self::Sequence(items.iter().map(Self::from_json).collect())
            }
            Value::Object(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
            Value::String(s) => Self::Scalar(s.clone()),
            Value::Null => Self::Scalar(String::new()),
            other => Self::Scalar(other.to_string()),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Self::Scalar(s) => Value::String(s),
            Self::Sequence(items) => {
                Value::Array(items.into_iter().map(Self::into_json).collect())
            }
            Self::Mapping(entries) => Value::Object(
                entries.into_iter().map(|(k, v)| (k, v.into_json())).collect(),
            ),
        }
    }

    /// Render every scalar (and every mapping key) through the renderer.
    pub fn render(
        self,
        renderer: &dyn TemplateRenderer,
        model: &Value,
    ) -> Result<ConfigValue, TemplateError> {
        Ok(match self {
            Self::Scalar(s) => Self::Scalar(renderer.render(&s, model)?),
            Self::Sequence(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(|item| item.render(renderer, model))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Mapping(entries) => Self::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((renderer.render(&k, model)?, v.render(renderer, model)?)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// Render an arbitrary clause value recursively and hand back JSON.
pub fn render_recursively(
    renderer: &dyn TemplateRenderer,
    model: &Value,
    value: &Value,
) -> Result<Value, TemplateError> {
    ConfigValue::from_json(value)
        .render(renderer, model)
        .map(ConfigValue::into_json)
}

/// Reference renderer resolving `{{ dotted.path }}` placeholders against the
/// model. Unresolvable paths render as an empty string, like the host's
/// template language. Not a template language: no helpers, no conditionals.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, model: &Value) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError(format!("unclosed placeholder in '{template}'")))?;
            out.push_str(&lookup(model, after[..end].trim()));
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn lookup(model: &Value, path: &str) -> String {
    let mut current = model;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v,
                None => return String::new(),
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return String::new(),
            },
            _ => return String::new(),
        };
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

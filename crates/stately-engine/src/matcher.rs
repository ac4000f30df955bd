use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use stately_core::params::MATCHER_HOOK;
use stately_core::template::render_recursively;
use stately_core::{
    ConfigurationError, Context, MatchResult, PatternEvaluator, RequestId, TemplateRenderer,
};
use tracing::debug;

use crate::context_manager::ContextManager;
use crate::error::EngineError;
use crate::render::render_context_name;

/// Route-selection predicate over stored contexts.
///
/// Exactly one primary clause (`hasContext`/`hasNotContext`); secondary
/// clauses only apply alongside `hasContext` and are ANDed. Every clause
/// value is rendered recursively before evaluation, against a model extended
/// with a `context` view of the matched context.
pub struct StateRequestMatcher {
    manager: Arc<ContextManager>,
    renderer: Arc<dyn TemplateRenderer>,
    patterns: Arc<dyn PatternEvaluator>,
}

type OperatorFn = fn(&Context, &Value, &dyn PatternEvaluator) -> Result<MatchResult, EngineError>;

/// Secondary clause registry: operator name to pure evaluation function.
static OPERATORS: &[(&str, OperatorFn)] = &[
    ("property", property_matches),
    ("list", list_entry_matches),
    ("hasProperty", has_property),
    ("hasNotProperty", has_not_property),
    ("updateCountEqualTo", update_count_equal_to),
    ("updateCountLessThan", update_count_less_than),
    ("updateCountMoreThan", update_count_more_than),
    ("listSizeEqualTo", list_size_equal_to),
    ("listSizeLessThan", list_size_less_than),
    ("listSizeMoreThan", list_size_more_than),
];

fn operator(name: &str) -> Option<OperatorFn> {
    OPERATORS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, f)| *f)
}

impl StateRequestMatcher {
    pub fn new(
        manager: Arc<ContextManager>,
        renderer: Arc<dyn TemplateRenderer>,
        patterns: Arc<dyn PatternEvaluator>,
    ) -> Self {
        Self {
            manager,
            renderer,
            patterns,
        }
    }

    pub fn match_request(
        &self,
        request_id: &RequestId,
        model: &Value,
        parameters: &Value,
    ) -> Result<MatchResult, EngineError> {
        let clauses = parameters.as_object().ok_or_else(|| {
            ConfigurationError::new(MATCHER_HOOK, "parameters must be a mapping")
        })?;
        let has_context = clauses.get("hasContext").and_then(Value::as_str);
        let has_not_context = clauses.get("hasNotContext").and_then(Value::as_str);
        match (has_context, has_not_context) {
            (Some(template), None) => self.has_context(request_id, model, clauses, template),
            (None, Some(template)) => self.has_not_context(model, template),
            _ => Err(ConfigurationError::new(
                MATCHER_HOOK,
                "parameters must contain exactly one of 'hasContext' or 'hasNotContext'",
            )
            .into()),
        }
    }

    fn has_not_context(&self, model: &Value, template: &str) -> Result<MatchResult, EngineError> {
        let name = render_context_name(&*self.renderer, model, template, MATCHER_HOOK)?;
        if self.manager.get_context_copy(&name)?.is_none() {
            debug!(context = %name, "hasNotContext matched");
            Ok(MatchResult::ExactMatch)
        } else {
            Ok(MatchResult::NoMatch)
        }
    }

    fn has_context(
        &self,
        request_id: &RequestId,
        model: &Value,
        clauses: &serde_json::Map<String, Value>,
        template: &str,
    ) -> Result<MatchResult, EngineError> {
        let name = render_context_name(&*self.renderer, model, template, MATCHER_HOOK)?;
        let Some(context) = self.manager.get_context_copy(&name)? else {
            return Ok(MatchResult::NoMatch);
        };

        let secondary: Vec<(&str, OperatorFn, &Value)> = clauses
            .iter()
            .filter_map(|(key, value)| operator(key).map(|f| (key.as_str(), f, value)))
            .collect();

        let result = if secondary.is_empty() {
            MatchResult::ExactMatch
        } else {
            let model = extend_with_context(model, &context);
            let mut results = Vec::with_capacity(secondary.len());
            for (clause, evaluate, raw) in secondary {
                let rendered = render_recursively(&*self.renderer, &model, raw)
                    .map_err(|e| ConfigurationError::new(MATCHER_HOOK, e.to_string()))?;
                let clause_result = evaluate(&context, &rendered, &*self.patterns)?;
                debug!(context = %name, clause, matched = clause_result.is_exact_match(), "clause evaluated");
                results.push(clause_result);
            }
            MatchResult::aggregate(results)
        };

        if result.is_exact_match() {
            self.manager.record_match(request_id, &name)?;
            debug!(context = %name, "hasContext matched");
        }
        Ok(result)
    }
}

/// Secondary clauses can reference the matched context in their templates.
fn extend_with_context(model: &Value, context: &Context) -> Value {
    let mut extended = model.clone();
    if let Value::Object(map) = &mut extended {
        map.insert(
            "context".to_string(),
            json!({
                "contextName": context.name(),
                "updateCount": context.update_count(),
                "listSize": context.list().len(),
                "properties": context.properties(),
                "list": context.list(),
            }),
        );
    }
    extended
}

fn invalid_type(clause: &str, value: &Value) -> EngineError {
    EngineError::Internal(format!(
        "'{clause}' configuration has invalid type: {value}"
    ))
}

fn property_matches(
    context: &Context,
    value: &Value,
    patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    let by_property = value.as_object().ok_or_else(|| invalid_type("property", value))?;
    let mut results = Vec::with_capacity(by_property.len());
    for (property, pattern) in by_property {
        let candidate = context.properties().get(property).map(String::as_str);
        results.push(patterns.eval(pattern, candidate)?);
    }
    if results.is_empty() {
        debug!(context = %context.name(), "no interpretable matcher found, defaulting to exact match");
        return Ok(MatchResult::ExactMatch);
    }
    Ok(MatchResult::aggregate(results))
}

fn list_entry_matches(
    context: &Context,
    value: &Value,
    patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    let by_selector = value.as_object().ok_or_else(|| invalid_type("list", value))?;
    let mut results = Vec::with_capacity(by_selector.len());
    for (selector, by_property) in by_selector {
        match select_list_entry(context, selector) {
            None => results.push(MatchResult::NoMatch),
            Some(entry) => {
                let by_property = by_selector_entry(by_property)?;
                let mut entry_results = Vec::with_capacity(by_property.len());
                for (property, pattern) in by_property {
                    let candidate = entry.get(property).map(String::as_str);
                    entry_results.push(patterns.eval(pattern, candidate)?);
                }
                if entry_results.is_empty() {
                    debug!(context = %context.name(), "no interpretable matcher found, defaulting to exact match");
                    results.push(MatchResult::ExactMatch);
                } else {
                    results.push(MatchResult::aggregate(entry_results));
                }
            }
        }
    }
    Ok(MatchResult::aggregate(results))
}

fn by_selector_entry(value: &Value) -> Result<&serde_json::Map<String, Value>, EngineError> {
    value.as_object().ok_or_else(|| invalid_type("list", value))
}

/// `"first"`/`"0"`, `"last"`/`"-1"`, or any non-negative integer string.
fn select_list_entry<'a>(
    context: &'a Context,
    selector: &str,
) -> Option<&'a HashMap<String, String>> {
    match selector {
        "first" => context.list().front(),
        "last" | "-1" => context.list().back(),
        other => other
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| context.list().get(index)),
    }
}

fn has_property(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    let property = value.as_str().ok_or_else(|| invalid_type("hasProperty", value))?;
    Ok(MatchResult::of(context.properties().contains_key(property)))
}

fn has_not_property(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    let property =
        value.as_str().ok_or_else(|| invalid_type("hasNotProperty", value))?;
    Ok(MatchResult::of(!context.properties().contains_key(property)))
}

/// Rendered operands are strings; anything unparsable yields no-match.
fn numeric_operand(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn compare_counter(
    value: &Value,
    counter: u64,
    compare: fn(u64, u64) -> bool,
) -> Result<MatchResult, EngineError> {
    Ok(match numeric_operand(value) {
        Some(operand) => MatchResult::of(compare(counter, operand)),
        None => MatchResult::NoMatch,
    })
}

fn update_count_equal_to(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    compare_counter(value, context.update_count(), |count, operand| count == operand)
}

fn update_count_less_than(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    compare_counter(value, context.update_count(), |count, operand| count < operand)
}

fn update_count_more_than(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    compare_counter(value, context.update_count(), |count, operand| count > operand)
}

fn list_size_equal_to(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    compare_counter(value, context.list().len() as u64, |size, operand| size == operand)
}

fn list_size_less_than(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    compare_counter(value, context.list().len() as u64, |size, operand| size < operand)
}

fn list_size_more_than(
    context: &Context,
    value: &Value,
    _patterns: &dyn PatternEvaluator,
) -> Result<MatchResult, EngineError> {
    compare_counter(value, context.list().len() as u64, |size, operand| size > operand)
}

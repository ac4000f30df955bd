use std::sync::Arc;

use serde_json::{json, Value};
use stately_core::Context;
use tracing::warn;

use crate::context_manager::ContextManager;
use crate::list_path;

/// Arguments of one `state` helper invocation inside a response template.
/// The host's template engine has already rendered them to plain strings.
#[derive(Clone, Debug, Default)]
pub struct StateValueRequest {
    pub context: String,
    pub property: Option<String>,
    pub list: Option<String>,
    pub default: Option<String>,
}

/// Template-value accessor: reads context state for response templating.
///
/// Never fails hard. Anything unresolvable falls back to the caller's
/// `default`, and without one renders an inline error sentinel the template
/// author will see in the response body.
pub struct StateHelper {
    manager: Arc<ContextManager>,
}

impl StateHelper {
    pub fn new(manager: Arc<ContextManager>) -> Self {
        Self { manager }
    }

    pub fn value(&self, request: &StateValueRequest) -> Value {
        match self.resolve(request) {
            Ok(value) => value,
            Err(message) => {
                warn!("{message}");
                Value::String(format!("[ERROR: {message}]"))
            }
        }
    }

    fn resolve(&self, request: &StateValueRequest) -> Result<Value, String> {
        if request.context.trim().is_empty() {
            return Err("'context' cannot be empty".into());
        }
        let selector = match (&request.property, &request.list) {
            (Some(property), None) => Selector::Property(property),
            (None, Some(path)) => Selector::ListPath(path),
            _ => return Err("either 'property' or 'list' has to be set".into()),
        };

        let context = self
            .manager
            .get_context_copy(&request.context)
            .map_err(|e| e.to_string())?;

        let found = context.as_ref().and_then(|context| match selector {
            Selector::Property(property) => property_value(context, property),
            Selector::ListPath(path) => list_path::resolve(context.list(), path),
        });

        match found {
            Some(value) => Ok(value),
            None => request
                .default
                .clone()
                .map(Value::String)
                .ok_or_else(|| no_value_message(&request.context, selector)),
        }
    }
}

#[derive(Clone, Copy)]
enum Selector<'a> {
    Property(&'a str),
    ListPath(&'a str),
}

/// Meta-properties take precedence over stored properties of the same name.
fn property_value(context: &Context, property: &str) -> Option<Value> {
    match property {
        "updateCount" => Some(json!(context.update_count())),
        "listSize" => Some(json!(context.list().len())),
        "list" => serde_json::to_value(context.list()).ok(),
        stored => context
            .properties()
            .get(stored)
            .map(|value| Value::String(value.clone())),
    }
}

fn no_value_message(context: &str, selector: Selector<'_>) -> String {
    match selector {
        Selector::Property(property) => {
            format!("no state for context {context}, property {property} found")
        }
        Selector::ListPath(path) => {
            format!("no state for context {context}, list {path} found")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionManager;
    use std::collections::HashMap;
    use stately_core::RequestId;
    use stately_store::TtlStore;

    fn setup() -> (StateHelper, Arc<ContextManager>, RequestId) {
        let manager = Arc::new(ContextManager::new(
            Arc::new(TtlStore::new()),
            Arc::new(TransactionManager::new()),
        ));
        (StateHelper::new(Arc::clone(&manager)), manager, RequestId::new())
    }

    fn request(context: &str, property: Option<&str>, list: Option<&str>) -> StateValueRequest {
        StateValueRequest {
            context: context.to_string(),
            property: property.map(str::to_string),
            list: list.map(str::to_string),
            default: None,
        }
    }

    fn assert_sentinel(value: &Value) {
        let text = value.as_str().expect("sentinel is a string");
        assert!(text.starts_with("[ERROR: "), "got: {text}");
    }

    #[test]
    fn reads_a_stored_property() {
        let (helper, manager, id) = setup();
        manager
            .create_or_update_state(
                &id,
                "c",
                &HashMap::from([("k".to_string(), "v".to_string())]),
            )
            .unwrap();

        assert_eq!(helper.value(&request("c", Some("k"), None)), "v");
    }

    #[test]
    fn meta_properties_win() {
        let (helper, manager, id) = setup();
        manager
            .create_or_update_state(
                &id,
                "c",
                &HashMap::from([("updateCount".to_string(), "stored".to_string())]),
            )
            .unwrap();
        manager
            .create_or_update_list(&id, "c", |list| {
                list.push_back(HashMap::from([("v".to_string(), "x".to_string())]));
            })
            .unwrap();

        assert_eq!(helper.value(&request("c", Some("updateCount"), None)), 2);
        assert_eq!(helper.value(&request("c", Some("listSize"), None)), 1);
        let raw_list = helper.value(&request("c", Some("list"), None));
        assert_eq!(raw_list.as_array().unwrap().len(), 1);
    }

    #[test]
    fn resolves_a_list_path() {
        let (helper, manager, id) = setup();
        for v in ["one", "two"] {
            manager
                .create_or_update_list(&id, "q", |list| {
                    list.push_back(HashMap::from([("v".to_string(), v.to_string())]));
                })
                .unwrap();
        }

        assert_eq!(helper.value(&request("q", None, Some("$[-1].v"))), "two");
    }

    #[test]
    fn missing_value_falls_back_to_default() {
        let (helper, manager, id) = setup();
        manager
            .create_or_update_state(
                &id,
                "c",
                &HashMap::from([("k".to_string(), "v".to_string())]),
            )
            .unwrap();

        let mut with_default = request("c", Some("missing"), None);
        with_default.default = Some("fallback".to_string());
        assert_eq!(helper.value(&with_default), "fallback");
    }

    #[test]
    fn missing_context_behaves_like_missing_property() {
        let (helper, _, _) = setup();

        let mut with_default = request("ghost", Some("k"), None);
        with_default.default = Some("fallback".to_string());
        assert_eq!(helper.value(&with_default), "fallback");

        assert_sentinel(&helper.value(&request("ghost", Some("k"), None)));
    }

    #[test]
    fn sentinel_names_the_missing_property() {
        let (helper, _, _) = setup();
        let value = helper.value(&request("ghost", Some("k"), None));
        assert_eq!(
            value.as_str().unwrap(),
            "[ERROR: no state for context ghost, property k found]"
        );
    }

    #[test]
    fn configuration_violations_render_sentinels() {
        let (helper, _, _) = setup();
        assert_sentinel(&helper.value(&request("", Some("k"), None)));
        assert_sentinel(&helper.value(&request("c", None, None)));
        assert_sentinel(&helper.value(&request("c", Some("k"), Some("$[0]"))));
    }
}

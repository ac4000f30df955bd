use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use stately_core::params::{ContextTarget, DeleteStateRequest, ListDeletion, DELETE_HOOK};
use stately_core::{ConfigurationError, RequestId, TemplateRenderer};
use tracing::{debug, warn};

use crate::context_manager::ContextManager;
use crate::error::EngineError;
use crate::render::{render_context_name, render_template};

/// Post-response hook deleting whole contexts (by name, list of names, or
/// regex) or single entries from a context's list.
pub struct DeleteStateHandler {
    manager: Arc<ContextManager>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl DeleteStateHandler {
    pub fn new(manager: Arc<ContextManager>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { manager, renderer }
    }

    pub fn handle(
        &self,
        request_id: &RequestId,
        model: &Value,
        parameters: &Value,
    ) -> Result<(), EngineError> {
        match DeleteStateRequest::parse(parameters)? {
            DeleteStateRequest::Contexts(target) => {
                self.delete_contexts(request_id, model, target)
            }
            DeleteStateRequest::List { context, op } => {
                self.delete_from_list(request_id, model, &context, op)
            }
        }
    }

    fn delete_contexts(
        &self,
        request_id: &RequestId,
        model: &Value,
        target: ContextTarget,
    ) -> Result<(), EngineError> {
        match target {
            ContextTarget::Single(template) => {
                let name =
                    render_context_name(&*self.renderer, model, &template, DELETE_HOOK)?;
                self.manager.delete_context(request_id, &name)
            }
            ContextTarget::Many(templates) => {
                for template in templates {
                    let name =
                        render_context_name(&*self.renderer, model, &template, DELETE_HOOK)?;
                    self.manager.delete_context(request_id, &name)?;
                }
                Ok(())
            }
            ContextTarget::Matching(template) => {
                let pattern =
                    render_template(&*self.renderer, model, &template, DELETE_HOOK)?;
                let regex = full_match_regex(&pattern)?;
                let mut matched = Vec::new();
                self.manager.on_each(request_id, |context| {
                    if regex.is_match(context.name()) {
                        matched.push(context.name().to_owned());
                    }
                })?;
                debug!(pattern = %pattern, count = matched.len(), "contextsMatching");
                for name in matched {
                    self.manager.delete_context(request_id, &name)?;
                }
                Ok(())
            }
        }
    }

    fn delete_from_list(
        &self,
        request_id: &RequestId,
        model: &Value,
        context: &str,
        op: ListDeletion,
    ) -> Result<(), EngineError> {
        let name = render_context_name(&*self.renderer, model, context, DELETE_HOOK)?;
        match op {
            ListDeletion::First => {
                self.manager.create_or_update_list(request_id, &name, |list| {
                    list.pop_front();
                })?;
            }
            ListDeletion::Last => {
                self.manager.create_or_update_list(request_id, &name, |list| {
                    list.pop_back();
                })?;
            }
            ListDeletion::Index(template) => {
                let rendered =
                    render_template(&*self.renderer, model, &template, DELETE_HOOK)?;
                match rendered.trim().parse::<i64>() {
                    Ok(index) if index >= 0 => {
                        self.manager.create_or_update_list(request_id, &name, |list| {
                            if list.remove(index as usize).is_none() {
                                warn!(context = %name, index, "list index out of range, skipping");
                            }
                        })?;
                    }
                    _ => {
                        warn!(context = %name, index = %rendered, "list index cannot be parsed, skipping");
                    }
                }
            }
            ListDeletion::Where { property, value } => {
                let property =
                    render_template(&*self.renderer, model, &property, DELETE_HOOK)?;
                let value = render_template(&*self.renderer, model, &value, DELETE_HOOK)?;
                self.manager.create_or_update_list(request_id, &name, |list| {
                    match list
                        .iter()
                        .position(|entry| entry.get(&property) == Some(&value))
                    {
                        Some(position) => {
                            list.remove(position);
                        }
                        None => {
                            debug!(context = %name, property = %property, "deleteWhere matched no entry");
                        }
                    }
                })?;
            }
        }
        Ok(())
    }
}

fn full_match_regex(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(&format!(r"\A(?:{pattern})\z")).map_err(|e| {
        ConfigurationError::new(DELETE_HOOK, format!("invalid regex '{pattern}': {e}")).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionManager;
    use serde_json::json;
    use std::collections::HashMap;
    use stately_core::{serve_model, PlaceholderRenderer};
    use stately_store::TtlStore;

    fn setup() -> (DeleteStateHandler, Arc<ContextManager>, RequestId) {
        let manager = Arc::new(ContextManager::new(
            Arc::new(TtlStore::new()),
            Arc::new(TransactionManager::new()),
        ));
        (
            DeleteStateHandler::new(Arc::clone(&manager), Arc::new(PlaceholderRenderer)),
            manager,
            RequestId::new(),
        )
    }

    fn model() -> Value {
        serve_model(json!({"query": {"name": "knownContextTwo"}}), json!({}))
    }

    fn seed_context(manager: &ContextManager, request: &RequestId, name: &str) {
        manager
            .create_or_update_state(
                request,
                name,
                &HashMap::from([("k".to_string(), "v".to_string())]),
            )
            .unwrap();
    }

    fn seed_list(manager: &ContextManager, request: &RequestId, name: &str, values: &[&str]) {
        for value in values {
            manager
                .create_or_update_list(request, name, |list| {
                    list.push_back(HashMap::from([("v".to_string(), value.to_string())]));
                })
                .unwrap();
        }
    }

    fn list_values(manager: &ContextManager, name: &str) -> Vec<String> {
        manager
            .get_context_copy(name)
            .unwrap()
            .unwrap()
            .list()
            .iter()
            .map(|entry| entry["v"].clone())
            .collect()
    }

    #[test]
    fn deletes_a_single_rendered_context() {
        let (handler, manager, request) = setup();
        seed_context(&manager, &request, "knownContextTwo");

        handler
            .handle(&request, &model(), &json!({"context": "{{request.query.name}}"}))
            .unwrap();
        assert!(manager.get_context_copy("knownContextTwo").unwrap().is_none());
    }

    #[test]
    fn deletes_many_with_absent_names_as_noops() {
        let (handler, manager, request) = setup();
        seed_context(&manager, &request, "a");
        seed_context(&manager, &request, "b");

        handler
            .handle(&request, &model(), &json!({"contexts": ["a", "missing", "b"]}))
            .unwrap();
        assert!(manager.get_context_copy("a").unwrap().is_none());
        assert!(manager.get_context_copy("b").unwrap().is_none());
    }

    #[test]
    fn regex_deletes_only_full_matches() {
        let (handler, manager, request) = setup();
        for name in ["knownContextOne", "knownContextTwo", "knownContextThree"] {
            seed_context(&manager, &request, name);
        }

        handler
            .handle(&request, &model(), &json!({"contextsMatching": ".*extTw.*"}))
            .unwrap();

        assert!(manager.get_context_copy("knownContextOne").unwrap().is_some());
        assert!(manager.get_context_copy("knownContextTwo").unwrap().is_none());
        assert!(manager.get_context_copy("knownContextThree").unwrap().is_some());
    }

    #[test]
    fn regex_is_anchored_to_the_whole_name() {
        let (handler, manager, request) = setup();
        seed_context(&manager, &request, "order");
        seed_context(&manager, &request, "order-archive");

        handler
            .handle(&request, &model(), &json!({"contextsMatching": "order"}))
            .unwrap();

        assert!(manager.get_context_copy("order").unwrap().is_none());
        assert!(manager.get_context_copy("order-archive").unwrap().is_some());
    }

    #[test]
    fn invalid_regex_is_a_configuration_error() {
        let (handler, _, request) = setup();
        let err = handler
            .handle(&request, &model(), &json!({"contextsMatching": "("}))
            .unwrap_err();
        assert!(err.to_string().starts_with("deleteState: invalid regex"));
    }

    #[test]
    fn delete_first_and_last() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["one", "two", "three"]);

        handler
            .handle(&request, &model(), &json!({"context": "q", "list": {"deleteFirst": true}}))
            .unwrap();
        handler
            .handle(&request, &model(), &json!({"context": "q", "list": {"deleteLast": true}}))
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["two"]);
    }

    #[test]
    fn delete_first_on_empty_list_is_a_noop() {
        let (handler, manager, request) = setup();
        seed_context(&manager, &request, "empty");

        handler
            .handle(
                &request,
                &model(),
                &json!({"context": "empty", "list": {"deleteFirst": true}}),
            )
            .unwrap();
        assert!(manager.get_context_copy("empty").unwrap().unwrap().list().is_empty());
    }

    #[test]
    fn add_add_delete_first_leaves_second_entry() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["first", "second"]);

        handler
            .handle(&request, &model(), &json!({"context": "q", "list": {"deleteFirst": true}}))
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["second"]);
    }

    #[test]
    fn delete_index_removes_the_addressed_entry() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["one", "two", "three"]);

        handler
            .handle(&request, &model(), &json!({"context": "q", "list": {"deleteIndex": "1"}}))
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["one", "three"]);
    }

    #[test]
    fn out_of_range_index_is_skipped() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["one"]);

        handler
            .handle(&request, &model(), &json!({"context": "q", "list": {"deleteIndex": "7"}}))
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["one"]);
    }

    #[test]
    fn unparsable_index_is_skipped() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["one"]);

        handler
            .handle(
                &request,
                &model(),
                &json!({"context": "q", "list": {"deleteIndex": "not-a-number"}}),
            )
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["one"]);
    }

    #[test]
    fn delete_where_removes_first_match_only() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["one", "two", "three"]);

        handler
            .handle(
                &request,
                &model(),
                &json!({
                    "context": "q",
                    "list": {"deleteWhere": {"property": "v", "value": "two"}}
                }),
            )
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["one", "three"]);
    }

    #[test]
    fn delete_where_without_match_is_a_noop() {
        let (handler, manager, request) = setup();
        seed_list(&manager, &request, "q", &["one"]);

        handler
            .handle(
                &request,
                &model(),
                &json!({
                    "context": "q",
                    "list": {"deleteWhere": {"property": "v", "value": "nope"}}
                }),
            )
            .unwrap();
        assert_eq!(list_values(&manager, "q"), vec!["one"]);
    }
}

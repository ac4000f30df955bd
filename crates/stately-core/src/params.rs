use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::ConfigurationError;

/// Registered hook names, used to attribute configuration errors.
pub const RECORD_HOOK: &str = "recordState";
pub const DELETE_HOOK: &str = "deleteState";
pub const MATCHER_HOOK: &str = "state-matcher";

// Raw wire shapes. Unknown keys are ignored on purpose: hook inputs travel
// inside stub mappings whose schema grows over time.

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRecordParameters {
    context: Option<String>,
    state: Option<HashMap<String, String>>,
    list: Option<RawRecordList>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRecordList {
    add_first: Option<HashMap<String, String>>,
    add_last: Option<HashMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDeleteParameters {
    context: Option<String>,
    contexts: Option<Vec<String>>,
    contexts_matching: Option<String>,
    list: Option<RawDeleteList>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDeleteList {
    delete_first: Option<bool>,
    delete_last: Option<bool>,
    delete_index: Option<String>,
    delete_where: Option<RawDeleteWhere>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDeleteWhere {
    property: Option<String>,
    value: Option<String>,
}

/// Validated recording-hook input. All string fields are unrendered templates.
#[derive(Clone, Debug)]
pub struct RecordStateRequest {
    pub context: String,
    pub state: Option<HashMap<String, String>>,
    pub list: Option<ListAddition>,
}

#[derive(Clone, Debug)]
pub enum ListAddition {
    First(HashMap<String, String>),
    Last(HashMap<String, String>),
}

impl RecordStateRequest {
    pub fn parse(raw: &Value) -> Result<Self, ConfigurationError> {
        let raw: RawRecordParameters = from_value(raw, RECORD_HOOK)?;
        let context = raw
            .context
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ConfigurationError::new(RECORD_HOOK, "no context specified"))?;
        let list = match raw.list {
            None => None,
            Some(list) => Some(match (list.add_first, list.add_last) {
                (Some(first), None) => ListAddition::First(first),
                (None, Some(last)) => ListAddition::Last(last),
                _ => {
                    return Err(ConfigurationError::new(
                        RECORD_HOOK,
                        "list requires exactly one of 'addFirst' or 'addLast'",
                    ))
                }
            }),
        };
        Ok(Self {
            context,
            state: raw.state,
            list,
        })
    }
}

/// Validated deletion-hook input, resolved to exactly one deletion shape.
#[derive(Clone, Debug)]
pub enum DeleteStateRequest {
    /// Delete whole contexts.
    Contexts(ContextTarget),
    /// Delete from a single context's list.
    List { context: String, op: ListDeletion },
}

#[derive(Clone, Debug)]
pub enum ContextTarget {
    Single(String),
    Many(Vec<String>),
    Matching(String),
}

#[derive(Clone, Debug)]
pub enum ListDeletion {
    First,
    Last,
    Index(String),
    Where { property: String, value: String },
}

impl DeleteStateRequest {
    pub fn parse(raw: &Value) -> Result<Self, ConfigurationError> {
        let raw: RawDeleteParameters = from_value(raw, DELETE_HOOK)?;
        match raw.list {
            Some(list) => {
                let context = raw
                    .context
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| ConfigurationError::new(DELETE_HOOK, "no context specified"))?;
                Ok(Self::List {
                    context,
                    op: parse_list_deletion(list)?,
                })
            }
            None => {
                let mut targets = Vec::new();
                if let Some(context) = raw.context.filter(|c| !c.trim().is_empty()) {
                    targets.push(ContextTarget::Single(context));
                }
                if let Some(contexts) = raw.contexts.filter(|c| !c.is_empty()) {
                    targets.push(ContextTarget::Many(contexts));
                }
                if let Some(pattern) = raw.contexts_matching.filter(|c| !c.trim().is_empty()) {
                    targets.push(ContextTarget::Matching(pattern));
                }
                match (targets.pop(), targets.is_empty()) {
                    (Some(target), true) => Ok(Self::Contexts(target)),
                    _ => Err(ConfigurationError::new(
                        DELETE_HOOK,
                        "requires exactly one of 'context', 'contexts' or 'contextsMatching'",
                    )),
                }
            }
        }
    }
}

fn parse_list_deletion(list: RawDeleteList) -> Result<ListDeletion, ConfigurationError> {
    let mut ops = Vec::new();
    if list.delete_first == Some(true) {
        ops.push(ListDeletion::First);
    }
    if list.delete_last == Some(true) {
        ops.push(ListDeletion::Last);
    }
    if let Some(index) = list.delete_index.filter(|i| !i.trim().is_empty()) {
        ops.push(ListDeletion::Index(index));
    }
    if let Some(where_) = list.delete_where {
        if let (Some(property), Some(value)) = (where_.property, where_.value) {
            ops.push(ListDeletion::Where { property, value });
        }
    }
    match (ops.pop(), ops.is_empty()) {
        (Some(op), true) => Ok(op),
        _ => Err(ConfigurationError::new(
            DELETE_HOOK,
            "missing/invalid configuration for list",
        )),
    }
}

fn from_value<T: serde::de::DeserializeOwned + Default>(
    raw: &Value,
    hook: &'static str,
) -> Result<T, ConfigurationError> {
    if raw.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| ConfigurationError::new(hook, format!("cannot parse parameters: {e}")))
}

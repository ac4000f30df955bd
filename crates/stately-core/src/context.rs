use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// How many request ids a context remembers for match dedup. A matcher may be
/// evaluated several times while one request is routed; only the first
/// evaluation per request id counts towards `match_count`.
pub const MATCH_DEDUP_WINDOW: usize = 10;

/// A named bundle of state persisted under its `context_name`.
///
/// The serialized shape (camelCase keys) is the durable blob format. The
/// request dedup window is deliberately transient: a context reloaded from a
/// durable backend starts with an empty window but keeps its counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    context_name: String,
    properties: HashMap<String, String>,
    list: VecDeque<HashMap<String, String>>,
    update_count: u64,
    match_count: u64,
    #[serde(skip)]
    requests: VecDeque<RequestId>,
}

impl Context {
    pub fn new(context_name: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            properties: HashMap::new(),
            list: VecDeque::new(),
            update_count: 1,
            match_count: 0,
            requests: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.context_name
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn match_count(&self) -> u64 {
        self.match_count
    }

    pub fn inc_update_count(&mut self) -> u64 {
        self.update_count += 1;
        self.update_count
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.properties
    }

    pub fn list(&self) -> &VecDeque<HashMap<String, String>> {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut VecDeque<HashMap<String, String>> {
        &mut self.list
    }

    /// Count a match for the given request id. Returns false when the id is
    /// already inside the dedup window, in which case nothing changes.
    pub fn count_match(&mut self, request_id: &RequestId) -> bool {
        if self.requests.contains(request_id) {
            return false;
        }
        self.requests.push_back(request_id.clone());
        while self.requests.len() > MATCH_DEDUP_WINDOW {
            self.requests.pop_front();
        }
        self.match_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_starts_at_one_update() {
        let context = Context::new("checkout");
        assert_eq!(context.name(), "checkout");
        assert_eq!(context.update_count(), 1);
        assert_eq!(context.match_count(), 0);
        assert!(context.properties().is_empty());
        assert!(context.list().is_empty());
    }

    #[test]
    fn inc_update_count() {
        let mut context = Context::new("checkout");
        assert_eq!(context.inc_update_count(), 2);
        assert_eq!(context.inc_update_count(), 3);
        assert_eq!(context.update_count(), 3);
    }

    #[test]
    fn count_match_dedups_within_window() {
        let mut context = Context::new("checkout");
        let id = RequestId::new();
        assert!(context.count_match(&id));
        assert!(!context.count_match(&id));
        assert_eq!(context.match_count(), 1);
    }

    #[test]
    fn count_match_window_is_bounded() {
        let mut context = Context::new("checkout");
        let first = RequestId::new();
        assert!(context.count_match(&first));
        for _ in 0..MATCH_DEDUP_WINDOW {
            assert!(context.count_match(&RequestId::new()));
        }
        // The first id has been pushed out of the window and counts again.
        assert!(context.count_match(&first));
        assert_eq!(context.match_count(), (MATCH_DEDUP_WINDOW + 2) as u64);
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let mut context = Context::new("checkout");
        context.properties_mut().insert("k".into(), "v".into());
        context.list_mut().push_back(HashMap::from([("id".to_string(), "1".to_string())]));

        let mut copy = context.clone();
        copy.properties_mut().insert("k".into(), "changed".into());
        copy.list_mut().clear();

        assert_eq!(context.properties()["k"], "v");
        assert_eq!(context.list().len(), 1);
    }

    #[test]
    fn serde_uses_camel_case_and_skips_requests() {
        let mut context = Context::new("checkout");
        context.inc_update_count();
        context.count_match(&RequestId::new());

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["contextName"], "checkout");
        assert_eq!(json["updateCount"], 2);
        assert_eq!(json["matchCount"], 1);
        assert!(json.get("requests").is_none());

        let parsed: Context = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.update_count(), 2);
        assert_eq!(parsed.match_count(), 1);
        // The dedup window does not survive the round trip.
        assert!(parsed.requests.is_empty());
    }
}

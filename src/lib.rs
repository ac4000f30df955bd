//! Stateful context extension for a request-mocking server.
//!
//! The host registers the four hooks exposed by [`StateExtension`]: the
//! matcher during route selection, recording and deletion as post-response
//! side effects, and the state helper inside response templates. Contexts
//! live in a pluggable [`Store`]; the host signals `request_complete` when it
//! finishes serving a request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

pub use stately_core::{
    serve_model, BasicPatternEvaluator, ConfigurationError, Context, MatchResult,
    PatternEvaluator, PlaceholderRenderer, RequestId, TemplateRenderer,
};
pub use stately_engine::{
    ContextManager, DeleteStateHandler, EngineError, RecordStateHandler, StateHelper,
    StateRequestMatcher, StateValueRequest, TransactionManager,
};
pub use stately_store::{
    BlobStore, InMemoryBlobStore, JsonBlobStore, Store, StoreError, TtlStore,
};
pub use stately_telemetry::{init_telemetry, TelemetryConfig};

/// Wires the managers and hook handlers around one store instance.
pub struct StateExtension {
    manager: Arc<ContextManager>,
    transactions: Arc<TransactionManager>,
    record: RecordStateHandler,
    delete: DeleteStateHandler,
    matcher: StateRequestMatcher,
    helper: StateHelper,
}

impl StateExtension {
    pub fn new(
        store: Arc<dyn Store<Context>>,
        renderer: Arc<dyn TemplateRenderer>,
        patterns: Arc<dyn PatternEvaluator>,
    ) -> Self {
        let transactions = Arc::new(TransactionManager::new());
        let manager = Arc::new(ContextManager::new(store, Arc::clone(&transactions)));
        Self {
            record: RecordStateHandler::new(Arc::clone(&manager), Arc::clone(&renderer)),
            delete: DeleteStateHandler::new(Arc::clone(&manager), Arc::clone(&renderer)),
            matcher: StateRequestMatcher::new(
                Arc::clone(&manager),
                Arc::clone(&renderer),
                patterns,
            ),
            helper: StateHelper::new(Arc::clone(&manager)),
            manager,
            transactions,
        }
    }

    /// TTL-evicting in-memory store with the default expiration.
    pub fn in_memory(
        renderer: Arc<dyn TemplateRenderer>,
        patterns: Arc<dyn PatternEvaluator>,
    ) -> Self {
        Self::new(Arc::new(TtlStore::new()), renderer, patterns)
    }

    /// TTL-evicting in-memory store; a zero duration selects the default.
    pub fn in_memory_with_expiration(
        ttl: Duration,
        renderer: Arc<dyn TemplateRenderer>,
        patterns: Arc<dyn PatternEvaluator>,
    ) -> Self {
        Self::new(Arc::new(TtlStore::with_expiration(ttl)), renderer, patterns)
    }

    /// Durable store serializing contexts into the given blob backend.
    pub fn durable(
        blobs: Box<dyn BlobStore>,
        renderer: Arc<dyn TemplateRenderer>,
        patterns: Arc<dyn PatternEvaluator>,
    ) -> Self {
        Self::new(Arc::new(JsonBlobStore::new(blobs)), renderer, patterns)
    }

    /// Post-response recording hook.
    pub fn record_state(
        &self,
        request_id: &RequestId,
        model: &Value,
        parameters: &Value,
    ) -> Result<(), EngineError> {
        self.record.handle(request_id, model, parameters)
    }

    /// Post-response deletion hook.
    pub fn delete_state(
        &self,
        request_id: &RequestId,
        model: &Value,
        parameters: &Value,
    ) -> Result<(), EngineError> {
        self.delete.handle(request_id, model, parameters)
    }

    /// Route-selection predicate hook.
    pub fn match_request(
        &self,
        request_id: &RequestId,
        model: &Value,
        parameters: &Value,
    ) -> Result<MatchResult, EngineError> {
        self.matcher.match_request(request_id, model, parameters)
    }

    /// Template-value accessor for response templates.
    pub fn state_value(&self, request: &StateValueRequest) -> Value {
        self.helper.value(request)
    }

    /// Host signal: the request has been fully served. Drops all transaction
    /// bookkeeping for it, whether or not any mutation happened.
    pub fn request_complete(&self, request_id: &RequestId) {
        self.transactions.on_request_complete(request_id);
    }

    pub fn context_manager(&self) -> &Arc<ContextManager> {
        &self.manager
    }
}

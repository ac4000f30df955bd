use std::collections::HashMap;

use dashmap::DashMap;
use stately_core::RequestId;
use tracing::debug;

/// Bookkeeping for one (request, context) pair. Not a database transaction:
/// it only records that the pair was touched while the request was served.
#[derive(Clone, Debug)]
pub struct Transaction {
    context_name: String,
    mutations: u64,
}

impl Transaction {
    fn new(context_name: &str) -> Self {
        Self {
            context_name: context_name.to_owned(),
            mutations: 0,
        }
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    pub fn record_mutation(&mut self) {
        self.mutations += 1;
    }
}

/// Per-request transaction records, held off to the side of the durable data
/// and dropped wholesale when the host signals end-of-request.
#[derive(Default)]
pub struct TransactionManager {
    transactions: DashMap<String, HashMap<String, Transaction>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the transaction for (request, context), creating it on
    /// first touch.
    pub fn with_transaction<T>(
        &self,
        request_id: &RequestId,
        context_name: &str,
        f: impl FnOnce(&mut Transaction) -> T,
    ) -> T {
        let mut request_transactions = self
            .transactions
            .entry(request_id.as_str().to_owned())
            .or_default();
        let transaction = request_transactions
            .entry(context_name.to_owned())
            .or_insert_with(|| Transaction::new(context_name));
        f(transaction)
    }

    /// Context names touched while serving the given request.
    pub fn context_names(&self, request_id: &RequestId) -> Vec<String> {
        self.transactions
            .get(request_id.as_str())
            .map(|txns| txns.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Discard all bookkeeping for a request. Called unconditionally when the
    /// host reports the request complete; an absent entry is a no-op.
    pub fn on_request_complete(&self, request_id: &RequestId) {
        if self.transactions.remove(request_id.as_str()).is_some() {
            debug!(request_id = %request_id, "transaction records dropped");
        }
    }

    pub fn active_requests(&self) -> usize {
        self.transactions.len()
    }
}

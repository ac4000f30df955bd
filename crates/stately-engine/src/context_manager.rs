use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use stately_core::{Context, RequestId};
use stately_store::Store;
use tracing::debug;

use crate::error::EngineError;
use crate::transaction::{Transaction, TransactionManager};

/// CRUD and compound mutations over contexts.
///
/// The store is internally synchronized, but a read-modify-write spans two
/// store calls; `lock` makes that sequence atomic per manager. Contexts are
/// created lazily by the first mutating call and start with an update count
/// of 1; every further mutating call increments it once (one count per call,
/// even when several calls serve the same request).
pub struct ContextManager {
    store: Arc<dyn Store<Context>>,
    transactions: Arc<TransactionManager>,
    lock: Mutex<()>,
}

impl ContextManager {
    pub fn new(store: Arc<dyn Store<Context>>, transactions: Arc<TransactionManager>) -> Self {
        Self {
            store,
            transactions,
            lock: Mutex::new(()),
        }
    }

    pub fn transactions(&self) -> &Arc<TransactionManager> {
        &self.transactions
    }

    /// An owned deep copy of the context, or None. Matchers can inspect the
    /// copy while writers keep mutating the stored original.
    pub fn get_context_copy(&self, name: &str) -> Result<Option<Context>, EngineError> {
        let _guard = self.lock.lock();
        Ok(self.store.get(name)?)
    }

    pub fn num_updates(&self, name: &str) -> Result<u64, EngineError> {
        Ok(self
            .get_context_copy(name)?
            .map(|context| context.update_count())
            .unwrap_or(0))
    }

    pub fn num_matches(&self, name: &str) -> Result<u64, EngineError> {
        Ok(self
            .get_context_copy(name)?
            .map(|context| context.match_count())
            .unwrap_or(0))
    }

    /// Remove the whole context. Deleting an absent context is a no-op.
    pub fn delete_context(&self, request_id: &RequestId, name: &str) -> Result<(), EngineError> {
        {
            let _guard = self.lock.lock();
            self.store.remove(name)?;
        }
        self.transactions
            .with_transaction(request_id, name, Transaction::record_mutation);
        debug!(context = %name, "context deleted");
        Ok(())
    }

    /// Remove every known context, each within its own transaction scope.
    pub fn delete_all_contexts(&self, request_id: &RequestId) -> Result<(), EngineError> {
        for name in self.known_names()? {
            self.delete_context(request_id, &name)?;
        }
        Ok(())
    }

    /// Upsert properties on the context, creating it if unknown. A value of
    /// literally `"null"` removes the property instead. Always one write-back
    /// and one counted mutation; returns the resulting update count.
    pub fn create_or_update_state(
        &self,
        request_id: &RequestId,
        name: &str,
        properties: &HashMap<String, String>,
    ) -> Result<u64, EngineError> {
        let count = {
            let _guard = self.lock.lock();
            let mut context = self.fetch_or_create(name)?;
            for (key, value) in properties {
                if value == "null" {
                    context.properties_mut().remove(key);
                } else {
                    context.properties_mut().insert(key.clone(), value.clone());
                }
            }
            let count = context.update_count();
            self.store.put(name, context)?;
            count
        };
        self.transactions
            .with_transaction(request_id, name, Transaction::record_mutation);
        Ok(count)
    }

    /// Apply an arbitrary mutation to the context's ordered list, creating
    /// the context if unknown. One write-back, one counted mutation.
    pub fn create_or_update_list(
        &self,
        request_id: &RequestId,
        name: &str,
        mutator: impl FnOnce(&mut VecDeque<HashMap<String, String>>),
    ) -> Result<u64, EngineError> {
        let count = {
            let _guard = self.lock.lock();
            let mut context = self.fetch_or_create(name)?;
            mutator(context.list_mut());
            let count = context.update_count();
            self.store.put(name, context)?;
            count
        };
        self.transactions
            .with_transaction(request_id, name, Transaction::record_mutation);
        Ok(count)
    }

    /// Visit a deep copy of every known context, each visit inside its own
    /// transaction scope for the given request.
    pub fn on_each(
        &self,
        request_id: &RequestId,
        mut visitor: impl FnMut(&Context),
    ) -> Result<(), EngineError> {
        for name in self.known_names()? {
            if let Some(context) = self.get_context_copy(&name)? {
                self.transactions.with_transaction(request_id, &name, |_| ());
                visitor(&context);
            }
        }
        Ok(())
    }

    /// Count a match for the request unless its id is still inside the
    /// context's dedup window. Does not touch the update count.
    pub fn record_match(&self, request_id: &RequestId, name: &str) -> Result<bool, EngineError> {
        let _guard = self.lock.lock();
        match self.store.get(name)? {
            Some(mut context) => {
                if context.count_match(request_id) {
                    self.store.put(name, context)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(false),
        }
    }

    fn known_names(&self) -> Result<Vec<String>, EngineError> {
        let _guard = self.lock.lock();
        Ok(self.store.keys()?)
    }

    // Caller holds the lock.
    fn fetch_or_create(&self, name: &str) -> Result<Context, EngineError> {
        Ok(match self.store.get(name)? {
            Some(mut context) => {
                context.inc_update_count();
                context
            }
            None => Context::new(name),
        })
    }
}

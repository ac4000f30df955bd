use std::sync::Arc;

use serde_json::Value;
use stately_core::params::{ListAddition, RecordStateRequest, RECORD_HOOK};
use stately_core::{RequestId, TemplateRenderer};
use tracing::{debug, info};

use crate::context_manager::ContextManager;
use crate::error::EngineError;
use crate::render::{render_context_name, render_map};

/// Post-response hook recording state into a context: property upserts plus
/// list prepend/append.
pub struct RecordStateHandler {
    manager: Arc<ContextManager>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl RecordStateHandler {
    pub fn new(manager: Arc<ContextManager>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { manager, renderer }
    }

    pub fn handle(
        &self,
        request_id: &RequestId,
        model: &Value,
        parameters: &Value,
    ) -> Result<(), EngineError> {
        let request = RecordStateRequest::parse(parameters)?;
        let context =
            render_context_name(&*self.renderer, model, &request.context, RECORD_HOOK)?;

        if let Some(state) = &request.state {
            let properties = render_map(&*self.renderer, model, state, RECORD_HOOK)?;
            let count =
                self.manager
                    .create_or_update_state(request_id, &context, &properties)?;
            debug!(context = %context, update_count = count, "state recorded");
        }

        match &request.list {
            Some(ListAddition::First(configuration)) => {
                let entry = render_map(&*self.renderer, model, configuration, RECORD_HOOK)?;
                self.manager
                    .create_or_update_list(request_id, &context, |list| list.push_front(entry))?;
                info!(context = %context, "list::addFirst");
            }
            Some(ListAddition::Last(configuration)) => {
                let entry = render_map(&*self.renderer, model, configuration, RECORD_HOOK)?;
                self.manager
                    .create_or_update_list(request_id, &context, |list| list.push_back(entry))?;
                info!(context = %context, "list::addLast");
            }
            None => {}
        }
        Ok(())
    }
}

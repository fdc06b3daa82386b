//! Per-table trigger routing

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{CommandTrigger, TriggerError, TriggerExecutor};
use crate::commitlog::StatusSink;
use crate::config::TriggerConfig;
use crate::domain::LogEntry;

/// Fallback route key
pub const WILDCARD: &str = "*";

/// Routes entries to executors by `keyspace.table`, falling back to `*`
#[derive(Default)]
pub struct TriggerRouter {
    routes: HashMap<String, Arc<dyn TriggerExecutor>>,
}

impl TriggerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build command triggers for every configured route
    ///
    /// The default command becomes the fallback. Every trigger reports its
    /// outcome to `sink`.
    pub fn from_config(config: &TriggerConfig, sink: Arc<dyn StatusSink>) -> Self {
        let command = |cmd: &str| -> Arc<dyn TriggerExecutor> {
            Arc::new(CommandTrigger::new(cmd, config.timeout()).with_status_sink(sink.clone()))
        };

        let router = config
            .routes
            .iter()
            .fold(Self::new(), |router, (table, cmd)| router.route(table.clone(), command(cmd.as_str())));
        router.fallback(command(config.command.as_str()))
    }

    /// Register an executor for `keyspace.table` (or `*`)
    pub fn route(mut self, key: impl Into<String>, executor: Arc<dyn TriggerExecutor>) -> Self {
        self.routes.insert(key.into(), executor);
        self
    }

    /// Register the fallback executor
    pub fn fallback(self, executor: Arc<dyn TriggerExecutor>) -> Self {
        self.route(WILDCARD, executor)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn resolve(&self, entry: &LogEntry) -> Option<&Arc<dyn TriggerExecutor>> {
        self.routes
            .get(&entry.qualified_table())
            .or_else(|| self.routes.get(WILDCARD))
    }
}

#[async_trait]
impl TriggerExecutor for TriggerRouter {
    async fn execute(&self, entry: &LogEntry) -> Result<(), TriggerError> {
        let table = entry.qualified_table();
        debug!(entry_id = %entry.id, %table, "TriggerRouter::execute: called");
        match self.resolve(entry) {
            Some(executor) => executor.execute(entry).await,
            None => Err(TriggerError::NoRoute(table)),
        }
    }
}

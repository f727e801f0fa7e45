//! Append-only trail of mutating actions.
//!
//! Recording is best effort: a failed append is logged and swallowed so it never undoes
//! or fails the mutation it describes.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{AuditVerb, EntityKind, NewAuditEntry, UserId};
use crate::store::AuditStore;
use crate::telemetry::AUDIT_TARGET;

pub struct AuditRecorder<S> {
    store: Arc<S>,
}

impl<S> Clone for AuditRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> AuditRecorder<S>
where
    S: AuditStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        actor: UserId,
        verb: AuditVerb,
        entity_kind: EntityKind,
        entity_id: Option<i64>,
        detail: Option<Value>,
    ) {
        let entry = NewAuditEntry {
            actor_id: actor,
            verb,
            entity_kind,
            entity_id,
            detail,
        };

        match self.store.append_audit_entry(entry.clone()).await {
            Ok(stored) => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    audit_id = stored.id,
                    actor_id = %stored.actor_id,
                    verb = %stored.verb,
                    entity_kind = %stored.entity_kind,
                    entity_id = ?stored.entity_id,
                    detail = ?stored.detail,
                    "audit entry recorded"
                );
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    actor_id = %entry.actor_id,
                    verb = entry.verb.as_str(),
                    entity_kind = entry.entity_kind.as_str(),
                    entity_id = ?entry.entity_id,
                    detail = ?entry.detail,
                    "failed to append audit entry"
                );
            }
        }
    }
}

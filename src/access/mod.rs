//! Authorization of (identity, record, operation) triples.

pub mod policy;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::auth::Session;
use crate::database::{DatabaseError, RecordStore};
use crate::resources::ResourceDescriptor;
use crate::types::Operation;

pub use policy::{load_policy, PolicyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Denied, with the reason logged server-side
    Deny(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn check_access(
        &self,
        session: &Session,
        resource: &ResourceDescriptor,
        record_id: &str,
        operation: Operation,
    ) -> Result<AccessDecision, DatabaseError>;
}

/// Role grants from the resource descriptor plus tenant ownership of the record
pub struct PolicyAccessControl {
    store: Arc<dyn RecordStore>,
}

impl PolicyAccessControl {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccessControl for PolicyAccessControl {
    async fn check_access(
        &self,
        session: &Session,
        resource: &ResourceDescriptor,
        record_id: &str,
        operation: Operation,
    ) -> Result<AccessDecision, DatabaseError> {
        let decision = if !resource.permits(&session.roles, operation) {
            AccessDecision::Deny(format!(
                "roles [{}] are not granted {} on {}",
                session.roles.join(", "),
                operation,
                resource.name
            ))
        } else {
            match self.store.owner_tenant(&resource.table, record_id).await? {
                Some(owner) if owner != session.tenant_id => {
                    AccessDecision::Deny(format!("record belongs to another tenant ({})", owner))
                }
                // Absent records fall through to the handler's not-found behaviour
                _ => AccessDecision::Allow,
            }
        };

        if let AccessDecision::Deny(reason) = &decision {
            warn!(
                actor = %session.actor_id,
                tenant = %session.tenant_id,
                resource = %resource.name,
                id = %record_id,
                operation = %operation,
                "Access denied: {}",
                reason
            );
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryRecordStore;
    use crate::resources::ResourceRegistry;
    use serde_json::json;

    fn session(tenant: &str, roles: &[&str]) -> Session {
        Session {
            actor_id: "u1".into(),
            tenant_id: tenant.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    async fn access() -> PolicyAccessControl {
        let store = MemoryRecordStore::new();
        store
            .insert("leave", json!({ "id": "l1", "tenant_id": "t1", "status": "pending" }).as_object().cloned().unwrap())
            .await
            .unwrap();
        PolicyAccessControl::new(Arc::new(store))
    }

    #[tokio::test]
    async fn allows_granted_role_in_owning_tenant() {
        let leaves = ResourceRegistry::builtin().get("leaves").unwrap();
        let decision = access()
            .await
            .check_access(&session("t1", &["employee"]), &leaves, "l1", Operation::Update)
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[tokio::test]
    async fn denies_ungranted_operation() {
        let leaves = ResourceRegistry::builtin().get("leaves").unwrap();
        let decision = access()
            .await
            .check_access(&session("t1", &["employee"]), &leaves, "l1", Operation::Delete)
            .await
            .unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn denies_records_of_other_tenants() {
        let leaves = ResourceRegistry::builtin().get("leaves").unwrap();
        let decision = access()
            .await
            .check_access(&session("t2", &["admin"]), &leaves, "l1", Operation::Read)
            .await
            .unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn absent_records_are_not_denied() {
        let leaves = ResourceRegistry::builtin().get("leaves").unwrap();
        let decision = access()
            .await
            .check_access(&session("t1", &["admin"]), &leaves, "missing", Operation::Delete)
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }
}

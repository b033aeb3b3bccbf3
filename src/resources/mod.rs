//! Resource descriptors and the registry that maps route names to them.
//!
//! Every `/api/:resource/:id` request is served by the same handler; the
//! descriptor supplies everything resource-specific: backing table, body
//! schema, queryable fields, includable relations and role grants.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::types::Operation;
use crate::validation::{schemas, Schema};

/// Fields managed by the store, never writable through the API
pub const SYSTEM_FIELDS: &[&str] = &["id", "tenant_id", "created_at", "updated_at"];

/// A to-one reference that can be embedded with `?include=<name>`
#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    pub name: String,
    /// Field on this resource holding the referenced id
    pub foreign_key: String,
    /// Route name of the referenced resource
    pub target: String,
}

impl Relation {
    pub fn new(name: impl Into<String>, foreign_key: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreign_key: foreign_key.into(),
            target: target.into(),
        }
    }
}

pub type Grants = BTreeMap<String, BTreeSet<Operation>>;

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub table: String,
    pub schema: Schema,
    pub filter_fields: Vec<String>,
    pub relations: Vec<Relation>,
    pub grants: Grants,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            schema,
            filter_fields: Vec::new(),
            relations: Vec::new(),
            grants: BTreeMap::new(),
        }
    }

    pub fn filter_fields(mut self, fields: &[&str]) -> Self {
        self.filter_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn grant(mut self, role: &str, operations: &[Operation]) -> Self {
        self.grants
            .entry(role.to_string())
            .or_default()
            .extend(operations.iter().copied());
        self
    }

    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn is_filter_field(&self, field: &str) -> bool {
        field == "id" || self.filter_fields.iter().any(|f| f == field)
    }

    /// Whether any of `roles` is granted `operation`
    pub fn permits(&self, roles: &[String], operation: Operation) -> bool {
        roles.iter().any(|role| {
            self.grants
                .get(role)
                .map_or(false, |ops| ops.contains(&operation))
        })
    }
}

/// Route name → descriptor lookup, built once at startup
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, Arc<ResourceDescriptor>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves, attendances and users with the default role grants
    pub fn builtin() -> Self {
        use Operation::*;

        let mut registry = Self::new();

        registry.register(
            ResourceDescriptor::new("leaves", "leave", schemas::leave())
                .filter_fields(&["status", "user_id", "start_date", "end_date"])
                .relation(Relation::new("user", "user_id", "users"))
                .grant("admin", &[Create, Read, Update, Delete])
                .grant("hr-manager", &[Create, Read, Update, Delete])
                .grant("employee", &[Create, Read, Update]),
        );

        registry.register(
            ResourceDescriptor::new("attendances", "attendance", schemas::attendance())
                .filter_fields(&["user_id", "date"])
                .relation(Relation::new("user", "user_id", "users"))
                .grant("admin", &[Create, Read, Update, Delete])
                .grant("hr-manager", &[Create, Read, Update, Delete])
                .grant("employee", &[Create, Read, Update]),
        );

        registry.register(
            ResourceDescriptor::new("users", "user", schemas::user())
                .filter_fields(&["email", "subject"])
                .grant("admin", &[Create, Read, Update, Delete])
                .grant("hr-manager", &[Read])
                .grant("employee", &[Read]),
        );

        registry
    }

    pub fn register(&mut self, descriptor: ResourceDescriptor) {
        self.resources
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceDescriptor>> {
        self.resources.get(name).cloned()
    }

    /// Replace role grants for the named resources. Unknown names are
    /// returned so callers can report them.
    pub fn replace_grants(&mut self, grants: BTreeMap<String, Grants>) -> Vec<String> {
        let mut unknown = Vec::new();
        for (name, resource_grants) in grants {
            match self.resources.get_mut(&name) {
                Some(descriptor) => Arc::make_mut(descriptor).grants = resource_grants,
                None => unknown.push(name),
            }
        }
        unknown
    }

    /// Descriptors sorted by route name
    pub fn descriptors(&self) -> Vec<Arc<ResourceDescriptor>> {
        let mut all: Vec<_> = self.resources.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors().iter().map(|d| d.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_hr_resources() {
        let registry = ResourceRegistry::builtin();
        assert_eq!(registry.names(), vec!["attendances", "leaves", "users"]);
        assert!(registry.get("payslips").is_none());

        let leaves = registry.get("leaves").unwrap();
        assert_eq!(leaves.table, "leave");
        assert_eq!(leaves.relation_named("user").unwrap().target, "users");
    }

    #[test]
    fn permits_checks_any_role() {
        let leaves = ResourceRegistry::builtin().get("leaves").unwrap();
        let employee = vec!["employee".to_string()];
        assert!(leaves.permits(&employee, Operation::Update));
        assert!(!leaves.permits(&employee, Operation::Delete));

        let both = vec!["guest".to_string(), "hr-manager".to_string()];
        assert!(leaves.permits(&both, Operation::Delete));
        assert!(!leaves.permits(&[], Operation::Read));
    }

    #[test]
    fn id_is_always_filterable() {
        let users = ResourceRegistry::builtin().get("users").unwrap();
        assert!(users.is_filter_field("id"));
        assert!(users.is_filter_field("email"));
        assert!(!users.is_filter_field("first_name"));
    }

    #[test]
    fn replace_grants_reports_unknown_resources() {
        let mut registry = ResourceRegistry::builtin();
        let mut grants = BTreeMap::new();
        grants.insert(
            "leaves".to_string(),
            BTreeMap::from([("auditor".to_string(), BTreeSet::from([Operation::Read]))]),
        );
        grants.insert("payslips".to_string(), Grants::new());

        let unknown = registry.replace_grants(grants);
        assert_eq!(unknown, vec!["payslips"]);

        let leaves = registry.get("leaves").unwrap();
        assert!(leaves.permits(&["auditor".to_string()], Operation::Read));
        assert!(!leaves.permits(&["admin".to_string()], Operation::Read));
    }
}

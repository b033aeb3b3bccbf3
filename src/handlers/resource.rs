//! The single handler behind `/api/:resource/:id`.
//!
//! Every resource shares this flow: the session is already resolved by the
//! middleware, the descriptor comes from the registry, access is checked once
//! for the operation the method implies, then the method is dispatched.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::Method,
    Extension, Json,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::app::AppState;
use crate::auth::Session;
use crate::database::Record;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::resources::{ResourceDescriptor, SYSTEM_FIELDS};
use crate::types::Operation;

use super::query::ReadOptions;

/// Methods served on a single record, advertised on 405
pub const ALLOWED_METHODS: &str = "GET, PUT, DELETE";

/// ANY /api/:resource/:id
pub async fn resource_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    method: Method,
    Path((resource, id)): Path<(String, String)>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let descriptor = state
        .registry
        .get(&resource)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", resource)))?;

    if let Some(operation) = Operation::from_method(&method) {
        authorize(&state, &session, &descriptor, &id, operation).await?;
    }

    match method {
        Method::GET => {
            let Query(params) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
            read_record(&state, &session, &descriptor, &id, &params).await
        }
        Method::PUT => update_record(&state, &session, &descriptor, &id, &body).await,
        Method::DELETE => delete_record(&state, &session, &descriptor, &id).await,
        other => Err(ApiError::method_not_allowed(other.as_str(), ALLOWED_METHODS)),
    }
}

/// Ask the access provider about one record; denial is a 403
async fn authorize(
    state: &AppState,
    session: &Session,
    descriptor: &ResourceDescriptor,
    id: &str,
    operation: Operation,
) -> Result<(), ApiError> {
    let decision = state
        .access
        .check_access(session, descriptor, id, operation)
        .await?;
    if !decision.is_allowed() {
        return Err(ApiError::forbidden(format!(
            "Not allowed to {} {} {}",
            operation, descriptor.name, id
        )));
    }
    Ok(())
}

async fn read_record(
    state: &AppState,
    session: &Session,
    descriptor: &ResourceDescriptor,
    id: &str,
    params: &HashMap<String, String>,
) -> Result<Json<Value>, ApiError> {
    let options = ReadOptions::parse(descriptor, params)?;

    let mut includes = Vec::with_capacity(options.include.len());
    for relation in &options.include {
        let target = state.registry.get(&relation.target).ok_or_else(|| {
            ApiError::internal_server_error(format!("Relation target '{}' is not registered", relation.target))
        })?;
        includes.push((*relation, target));
    }

    let found = state
        .store
        .find_first(&descriptor.table, &session.tenant_id, options.to_filter(id))
        .await?;

    let Some(mut record) = found else {
        debug!("{} {} not found in tenant {}", descriptor.name, id, session.tenant_id);
        return Ok(Json(Value::Null));
    };

    // Embedded records are reads of their own resource and go through the
    // same access check as a direct GET
    for (relation, target) in &includes {
        let related = match record.get(&relation.foreign_key).and_then(Value::as_str) {
            Some(foreign_id) => {
                authorize(state, session, target, foreign_id, Operation::Read).await?;
                state
                    .store
                    .find_first(&target.table, &session.tenant_id, FilterData::by_id(foreign_id))
                    .await?
                    .map(Value::Object)
                    .unwrap_or(Value::Null)
            }
            None => Value::Null,
        };
        record.insert(relation.name.clone(), related);
    }

    Ok(Json(Value::Object(options.finish(record))))
}

async fn update_record(
    state: &AppState,
    session: &Session,
    descriptor: &ResourceDescriptor,
    id: &str,
    body: &Bytes,
) -> Result<Json<Value>, ApiError> {
    let patch = parse_body(body)?;

    if let Some(field) = patch.keys().find(|k| SYSTEM_FIELDS.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field '{}' cannot be written", field)));
    }

    let patch = descriptor.schema.validate(&patch, state.validation_mode)?;

    let updated = state
        .store
        .update(&descriptor.table, &session.tenant_id, id, &patch)
        .await?;

    info!(
        actor = %session.actor_id,
        tenant = %session.tenant_id,
        "Updated {} {} ({} fields)",
        descriptor.name,
        id,
        patch.len()
    );
    Ok(Json(Value::Object(updated)))
}

async fn delete_record(
    state: &AppState,
    session: &Session,
    descriptor: &ResourceDescriptor,
    id: &str,
) -> Result<Json<Value>, ApiError> {
    let deleted = state
        .store
        .delete(&descriptor.table, &session.tenant_id, id)
        .await?;

    info!(
        actor = %session.actor_id,
        tenant = %session.tenant_id,
        "Deleted {} {}",
        descriptor.name,
        id
    );
    Ok(Json(Value::Object(deleted)))
}

fn parse_body(body: &Bytes) -> Result<Record, ApiError> {
    if body.is_empty() {
        return Err(ApiError::invalid_json("Request body is empty"));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::invalid_json("Request body must be a JSON object")),
        Err(e) => Err(ApiError::invalid_json(format!("Invalid JSON body: {}", e))),
    }
}

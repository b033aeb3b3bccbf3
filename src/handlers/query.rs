//! Query-string options accepted by `GET /api/:resource/:id`

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ApiError;
use crate::filter::FilterData;
use crate::resources::{Relation, ResourceDescriptor, SYSTEM_FIELDS};

#[derive(Debug, Default)]
pub struct ReadOptions<'a> {
    /// `fields=a,b`; `None` returns every field
    pub fields: Option<Vec<String>>,
    /// `include=rel`
    pub include: Vec<&'a Relation>,
    /// `<filter_field>=value`
    pub filters: Map<String, Value>,
}

impl<'a> ReadOptions<'a> {
    pub fn parse(resource: &'a ResourceDescriptor, params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let mut options = ReadOptions::default();

        for (key, value) in params {
            match key.as_str() {
                "fields" => options.fields = Some(parse_fields(resource, value)?),
                "include" => {
                    for name in split_list(value) {
                        let relation = resource.relation_named(name).ok_or_else(|| {
                            ApiError::bad_request(format!("Unknown relation '{}' for {}", name, resource.name))
                        })?;
                        options.include.push(relation);
                    }
                }
                field if resource.is_filter_field(field) => {
                    options.filters.insert(field.to_string(), Value::String(value.clone()));
                }
                other => {
                    return Err(ApiError::bad_request(format!(
                        "Unsupported query parameter '{}' for {}",
                        other, resource.name
                    )))
                }
            }
        }

        Ok(options)
    }

    /// Store filter for the record `id`. Foreign keys of included relations are
    /// selected even when not requested so the relation can be resolved.
    pub fn to_filter(&self, id: &str) -> FilterData {
        let mut filter = FilterData::by_id(id);
        if !self.filters.is_empty() {
            filter = filter.and_where(Value::Object(self.filters.clone()));
        }
        if let Some(fields) = &self.fields {
            let mut select = fields.clone();
            for relation in &self.include {
                if !select.contains(&relation.foreign_key) {
                    select.push(relation.foreign_key.clone());
                }
            }
            filter.select = Some(select);
        }
        filter
    }

    /// Drop foreign keys that were only selected to resolve includes
    pub fn finish(&self, mut record: Map<String, Value>) -> Map<String, Value> {
        if let Some(fields) = &self.fields {
            for relation in &self.include {
                if !fields.contains(&relation.foreign_key) {
                    record.remove(&relation.foreign_key);
                }
            }
        }
        record
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_fields(resource: &ResourceDescriptor, value: &str) -> Result<Vec<String>, ApiError> {
    let mut fields = vec!["id".to_string()];
    for field in split_list(value) {
        if resource.schema.field(field).is_none() && !SYSTEM_FIELDS.contains(&field) {
            return Err(ApiError::bad_request(format!("Unknown field '{}' for {}", field, resource.name)));
        }
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    Ok(fields)
}

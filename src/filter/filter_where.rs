use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::Filter;
use super::types::{FilterOp, FilterWhereInfo};

/// Where-clause language shared by the SQL and in-memory stores.
///
/// `{ "field": value }` is equality, `{ "field": { "$op": value } }` applies
/// an operator, `{ "$and": [ ... ] }` nests. Strings compare against the
/// text form of the column so query-string values work for any column type.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Build a SQL predicate, numbering placeholders after `starting_param_index`
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build(where_data)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        Self::parse_where_data(where_data).map(|_| ())
    }

    /// Evaluate the where clause against a record held in memory
    pub fn matches(where_data: &Value, record: &Map<String, Value>) -> Result<bool, FilterError> {
        for condition in Self::parse_where_data(where_data)? {
            if !Self::matches_condition(&condition, record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn build(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let conditions = Self::parse_where_data(where_data)?;
        let mut sql_conditions = vec![];
        for condition in &conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        Ok(if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") })
    }

    fn parse_where_data(where_data: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => {
                let mut conditions = vec![];
                for (key, value) in obj {
                    if key == "$and" {
                        if !value.is_array() {
                            return Err(FilterError::InvalidOperatorData("$and requires array".to_string()));
                        }
                        conditions.push(FilterWhereInfo { column: String::new(), operator: FilterOp::And, data: value.clone() });
                    } else if key.starts_with('$') {
                        return Err(FilterError::UnsupportedOperator(key.clone()));
                    } else {
                        Filter::validate_column(key)?;
                        Self::parse_field_condition(key, value, &mut conditions)?;
                    }
                }
                Ok(conditions)
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value, out: &mut Vec<FilterWhereInfo>) -> Result<(), FilterError> {
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    let operator = Self::map_operator(op_key)?;
                    out.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() });
                }
            }
            Value::Object(_) | Value::Array(_) => {
                return Err(FilterError::InvalidOperatorData(format!("cannot compare '{}' to a structured value", field)));
            }
            // Implicit equality: { field: value }
            _ => out.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() }),
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => match &condition.data {
                Value::Null => Ok(format!("{} IS NULL", quoted_column)),
                Value::String(_) => Ok(format!("{}::text = {}", quoted_column, self.param(condition.data.clone()))),
                _ => Ok(format!("{} = {}", quoted_column, self.param(condition.data.clone()))),
            },
            FilterOp::Ne => match &condition.data {
                Value::Null => Ok(format!("{} IS NOT NULL", quoted_column)),
                Value::String(_) => Ok(format!("{}::text <> {}", quoted_column, self.param(condition.data.clone()))),
                _ => Ok(format!("{} <> {}", quoted_column, self.param(condition.data.clone()))),
            },
            FilterOp::In | FilterOp::NIn => {
                let values = Self::list(condition)?;
                let negate = condition.operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.iter().map(|v| self.param(Value::String(as_text(v)))).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                Ok(format!("{}::text {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::And => {
                let mut parts = vec![];
                for sub in condition.data.as_array().into_iter().flatten() {
                    let (sql, params) = Self::generate(sub, self.param_index)?;
                    self.param_index += params.len();
                    self.param_values.extend(params);
                    parts.push(format!("({})", sql));
                }
                Ok(if parts.is_empty() { "1=1".to_string() } else { parts.join(" AND ") })
            }
        }
    }

    fn matches_condition(condition: &FilterWhereInfo, record: &Map<String, Value>) -> Result<bool, FilterError> {
        let current = record.get(&condition.column).filter(|v| !v.is_null());
        Ok(match condition.operator {
            FilterOp::Eq => match (&condition.data, current) {
                (Value::Null, current) => current.is_none(),
                (expected, Some(actual)) => loose_eq(actual, expected),
                (_, None) => false,
            },
            FilterOp::Ne => match (&condition.data, current) {
                (Value::Null, current) => current.is_some(),
                (expected, Some(actual)) => !loose_eq(actual, expected),
                (_, None) => false,
            },
            FilterOp::In | FilterOp::NIn => {
                let values = Self::list(condition)?;
                match current {
                    None => false,
                    Some(actual) => {
                        let found = values.iter().any(|v| as_text(v) == as_text(actual));
                        found == (condition.operator == FilterOp::In)
                    }
                }
            }
            FilterOp::And => {
                for sub in condition.data.as_array().into_iter().flatten() {
                    if !Self::matches(sub, record)? {
                        return Ok(false);
                    }
                }
                true
            }
        })
    }

    fn list(condition: &FilterWhereInfo) -> Result<&Vec<Value>, FilterError> {
        condition.data.as_array().ok_or_else(|| {
            FilterError::InvalidOperatorData(format!("{} requires array", condition.column))
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Text form of a scalar, matching a Postgres `::text` cast for strings,
/// numbers and booleans
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match expected {
        Value::String(s) => !actual.is_object() && !actual.is_array() && as_text(actual) == *s,
        _ => false,
    }
}

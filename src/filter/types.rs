use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,
    #[serde(rename = "$and")] And,
}

/// Select + where description of a single-table read
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<serde_json::Value>,
    pub limit: Option<i32>,
}

impl FilterData {
    /// Where clause matching a single record id
    pub fn by_id(id: &str) -> Self {
        Self {
            where_clause: Some(serde_json::json!({ "id": id })),
            ..Default::default()
        }
    }

    /// AND an extra condition onto the existing where clause
    pub fn and_where(mut self, condition: serde_json::Value) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            None => condition,
            Some(existing) => serde_json::json!({ "$and": [existing, condition] }),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}

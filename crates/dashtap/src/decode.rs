//! Decode batched dashboard responses into flat column maps.
//!
//! Wire shape:
//!
//! ```text
//! {"dataResponse": [{"dataSubset": [{"dataset": {"tableDataset": {
//!     "columnInfo": [{"name": "qt_..."}, ...],
//!     "column": [{"longColumn": {"values": ["10"]}}, {"doubleColumn": {"values": [250.0]}}, ...]
//! }}}]}]}
//! ```
//!
//! `columnInfo[i]` names `column[i]`. Only the first value of each typed
//! container is read; columns with no value are omitted rather than zeroed.

use crate::error::DecodeError;
use crate::types::{ColumnMap, RawValue};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Anti-JSON-hijacking prefix the dashboard puts in front of response bodies.
pub const GUARD_PREFIX: &str = ")]}'";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchedResponse {
    #[serde(default, deserialize_with = "nullable")]
    data_response: Vec<DataResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataResponse {
    #[serde(default, deserialize_with = "nullable")]
    data_subset: Vec<DataSubset>,
}

#[derive(Debug, Default, Deserialize)]
struct DataSubset {
    #[serde(default)]
    dataset: Option<Dataset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(default)]
    table_dataset: Option<TableDataset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableDataset {
    #[serde(default, deserialize_with = "nullable")]
    column_info: Vec<ColumnInfo>,
    #[serde(default, deserialize_with = "nullable")]
    column: Vec<TypedColumn>,
}

#[derive(Debug, Default, Deserialize)]
struct ColumnInfo {
    #[serde(default, deserialize_with = "nullable")]
    name: String,
}

/// One column's value, wrapped in whichever typed container the source used.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedColumn {
    #[serde(default)]
    long_column: Option<ValueList>,
    #[serde(default)]
    double_column: Option<ValueList>,
    #[serde(default)]
    string_column: Option<ValueList>,
    #[serde(default)]
    primitive_value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ValueList {
    #[serde(default, deserialize_with = "nullable")]
    values: Vec<Value>,
}

impl TypedColumn {
    /// First value of the first non-empty container: long, double, string, then primitive.
    fn first_value(&self) -> Option<RawValue> {
        [&self.long_column, &self.double_column, &self.string_column]
            .into_iter()
            .flatten()
            .find_map(|list| list.values.first())
            .or(self.primitive_value.as_ref())
            .and_then(RawValue::from_json)
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Remove the guard prefix (and any whitespace around it) from a response body.
pub fn strip_guard<'a>(body: &'a str, guard: &str) -> &'a str {
    let trimmed = body.trim_start();
    match trimmed.strip_prefix(guard) {
        Some(rest) if !guard.is_empty() => rest.trim_start(),
        _ => trimmed,
    }
}

/// Decode one response body, reporting why it could not be read.
pub fn try_decode(body: &str, guard: &str) -> Result<ColumnMap, DecodeError> {
    let json = strip_guard(body, guard).trim_end();
    if json.is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(DecodeError::Shape("top level is not an object".into()));
    }
    if !value.get("dataResponse").is_some_and(Value::is_array) {
        return Err(DecodeError::Shape("no dataResponse array".into()));
    }
    let response: BatchedResponse =
        serde_json::from_value(value).map_err(|e| DecodeError::Shape(e.to_string()))?;

    let mut columns = ColumnMap::new();
    let tables = response
        .data_response
        .iter()
        .flat_map(|dr| dr.data_subset.iter())
        .filter_map(|subset| subset.dataset.as_ref())
        .filter_map(|dataset| dataset.table_dataset.as_ref());

    for table in tables {
        for (info, column) in table.column_info.iter().zip(table.column.iter()) {
            if info.name.is_empty() {
                continue;
            }
            if let Some(value) = column.first_value() {
                columns.insert(info.name.clone(), value);
            }
        }
    }

    Ok(columns)
}

/// Decode one response body; anything unreadable yields an empty map.
pub fn decode_payload(body: &str, guard: &str) -> ColumnMap {
    match try_decode(body, guard) {
        Ok(columns) => columns,
        Err(e) => {
            tracing::debug!("discarding undecodable payload: {e}");
            ColumnMap::new()
        }
    }
}

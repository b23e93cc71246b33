//! Enriched row model
//!
//! Report rows carry a dynamic set of custom columns, one per statement type
//! discovered for the request's company set. A cell is either a number, a
//! raw source string, or the `MISSING` sentinel when the account has no
//! mapping for that column.

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Sentinel rendered for cells with no mapping
pub const MISSING: &str = "MISSING";

/// One cell value in a dynamic column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Numeric cell
    Number(Decimal),
    /// Raw source string
    Text(String),
    /// No mapping exists for this row and column
    Missing,
}

impl Serialize for ColumnValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ColumnValue::Number(d) => Serialize::serialize(d, serializer),
            ColumnValue::Text(t) => serializer.serialize_str(t),
            ColumnValue::Missing => serializer.serialize_str(MISSING),
        }
    }
}

/// One named dynamic column cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomColumn {
    /// Column (statement type) name
    pub name: String,
    /// Cell value
    pub value: ColumnValue,
}

/// Materialize the full column universe for one row, in universe order.
///
/// `label_for` supplies the cell text for a column when the row's category
/// mapping carries a label for it; every other cell is `Missing`. Every row
/// produced this way has exactly `universe.len()` cells, which is what keeps
/// multi-company output rectangular.
pub fn materialize_columns<'a>(
    universe: &[String],
    mut label_for: impl FnMut(&str) -> Option<&'a str>,
) -> Vec<CustomColumn> {
    universe
        .iter()
        .map(|name| CustomColumn {
            name: name.clone(),
            value: match label_for(name) {
                Some(text) => ColumnValue::Text(text.to_string()),
                None => ColumnValue::Missing,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_serializes_as_sentinel() {
        let json = serde_json::to_string(&ColumnValue::Missing).unwrap();
        assert_eq!(json, "\"MISSING\"");
    }

    #[test]
    fn test_number_and_text_serialization() {
        let json = serde_json::to_string(&ColumnValue::Text("Revenue".to_string())).unwrap();
        assert_eq!(json, "\"Revenue\"");
        // Decimal serializes through its own representation
        let json = serde_json::to_string(&ColumnValue::Number(Decimal::new(12345, 2))).unwrap();
        assert!(json.contains("123.45"));
    }

    #[test]
    fn test_materialize_is_rectangular() {
        let universe = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let cols = materialize_columns(&universe, |name| match name {
            "B" => Some("label-b"),
            _ => None,
        });
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].value, ColumnValue::Missing);
        assert_eq!(cols[1].value, ColumnValue::Text("label-b".to_string()));
        assert_eq!(cols[2].value, ColumnValue::Missing);
        // Universe order preserved
        assert_eq!(cols.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["A", "B", "C"]);
    }
}

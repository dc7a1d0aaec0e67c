use serde::ser::{Serialize, SerializeMap, Serializer};

use super::interpreter::ResultTable;
use crate::storage::Value;

/// One output row as ordered `(name, value)` pairs. Serializes as a map in
/// column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Pairs every row with the output column names.
pub fn convert(table: ResultTable) -> Vec<Record> {
    let ResultTable { columns, rows, .. } = table;

    rows.into_iter()
        .map(|row| {
            Record::new(
                columns
                    .iter()
                    .cloned()
                    .zip(row.values)
                    .collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Row;

    fn table() -> ResultTable {
        ResultTable {
            columns: vec!["Prov_Name".into(), "lat".into(), "capital".into(), "note".into()],
            rows: vec![
                Row::new(vec![
                    Value::String("Uruzgan".into()),
                    Value::Float(32.7),
                    Value::Boolean(true),
                    Value::Null,
                ]),
                Row::new(vec![
                    Value::String("Farah".into()),
                    Value::Integer(32),
                    Value::Boolean(false),
                    Value::String("x".into()),
                ]),
            ],
            diagnostics: vec![],
        }
    }

    #[test]
    fn test_convert_keeps_order_and_types() {
        let records = convert(table());

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].names().collect::<Vec<_>>(),
            vec!["Prov_Name", "lat", "capital", "note"]
        );
        assert_eq!(records[1].get("lat"), Some(&Value::Integer(32)));
        assert_eq!(records[0].get("missing"), None);
    }

    #[test]
    fn test_json_object_in_column_order() {
        let records = convert(table());
        let json = serde_json::to_string(&records).unwrap();

        assert_eq!(
            json,
            r#"[{"Prov_Name":"Uruzgan","lat":32.7,"capital":true,"note":null},{"Prov_Name":"Farah","lat":32,"capital":false,"note":"x"}]"#
        );
    }

    #[test]
    fn test_empty_result() {
        let table = ResultTable {
            columns: vec!["a".into()],
            rows: vec![],
            diagnostics: vec![],
        };
        assert!(convert(table).is_empty());
    }
}

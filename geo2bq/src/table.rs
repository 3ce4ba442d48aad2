//! Jeu de données tabulaire chargé dans l'entrepôt
//!
//! Les lignes gardent l'ordre des colonnes ; les valeurs absentes sont `null`
//! et les valeurs non scalaires (tableaux, objets) sont stockées sous forme de
//! texte JSON.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Une ligne : colonne -> valeur scalaire, dans l'ordre des colonnes
pub type Row = Map<String, Value>;

/// Erreurs de construction du jeu de données
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Column `{column}` has {actual} values for {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Type d'une colonne BigQuery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    String,
}

impl ColumnType {
    /// Type d'une valeur ; `None` pour `null`
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() => Some(Self::Integer),
            Value::Number(_) => Some(Self::Float),
            _ => Some(Self::String),
        }
    }

    /// Type commun à deux valeurs d'une même colonne
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Self::Float,
            _ => Self::String,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::String => "STRING",
        }
    }
}

/// Champ du schéma de la table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub mode: &'static str,
}

/// Colonnes ordonnées et lignes
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Construit le jeu de données ; les clés inconnues de `columns` sont
    /// ajoutées en fin, dans l'ordre de première apparition
    pub fn from_rows(mut columns: Vec<String>, rows: Vec<Row>) -> Self {
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|column| {
                        let value = row.remove(column).unwrap_or(Value::Null);
                        (column.clone(), scalar(value))
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Valeurs d'une colonne, dans l'ordre des lignes
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        if !self.columns.iter().any(|c| c == name) {
            return None;
        }
        Some(self.rows.iter().map(|r| &r[name]).collect())
    }

    /// Ajoute une colonne, ou remplace les valeurs d'une colonne existante
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), DatasetError> {
        if values.len() != self.rows.len() {
            return Err(DatasetError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(name.to_string(), scalar(value));
        }
        Ok(())
    }

    /// Retire une colonne ; `false` si elle n'existait pas
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.columns.iter().position(|c| c == name) else {
            return false;
        };
        self.columns.remove(index);
        for row in &mut self.rows {
            row.shift_remove(name);
        }
        true
    }

    /// Schéma inféré : colonne vide -> STRING, entier + flottant -> FLOAT,
    /// tout autre mélange -> STRING. Toutes les colonnes sont NULLABLE.
    pub fn infer_schema(&self) -> Vec<Field> {
        self.columns
            .iter()
            .map(|name| {
                let column_type = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(name).and_then(ColumnType::of))
                    .reduce(ColumnType::merge)
                    .unwrap_or(ColumnType::String);

                Field {
                    name: name.clone(),
                    column_type,
                    mode: "NULLABLE",
                }
            })
            .collect()
    }

    /// Sérialise en JSON délimité par des retours à la ligne (un objet par ligne).
    ///
    /// Les colonnes typées STRING reçoivent le texte des valeurs non textuelles
    /// pour que le chargement respecte le schéma inféré.
    pub fn to_ndjson(&self) -> Result<Vec<u8>, serde_json::Error> {
        let schema = self.infer_schema();
        let mut out = Vec::new();

        for row in &self.rows {
            let mut line = Row::new();
            for field in &schema {
                let value = row.get(&field.name).cloned().unwrap_or(Value::Null);
                let value = match (field.column_type, value) {
                    (ColumnType::String, Value::Bool(b)) => Value::String(b.to_string()),
                    (ColumnType::String, Value::Number(n)) => Value::String(n.to_string()),
                    (_, value) => value,
                };
                line.insert(field.name.clone(), value);
            }
            serde_json::to_writer(&mut out, &line)?;
            out.push(b'\n');
        }

        Ok(out)
    }
}

fn scalar(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    #[test]
    fn test_missing_values_are_null() {
        let dataset = Dataset::from_rows(
            vec!["GEOID".into(), "ALAND".into()],
            vec![
                row(json!({"GEOID": "08031", "ALAND": 10})),
                row(json!({"GEOID": "08032"})),
            ],
        );
        assert_eq!(dataset.rows()[1]["ALAND"], Value::Null);
        assert_eq!(dataset.columns(), ["GEOID", "ALAND"]);
    }

    #[test]
    fn test_unknown_keys_are_appended() {
        let dataset = Dataset::from_rows(
            vec!["a".into()],
            vec![row(json!({"a": 1, "z": 2})), row(json!({"b": 3}))],
        );
        assert_eq!(dataset.columns(), ["a", "z", "b"]);
    }

    #[test]
    fn test_infer_schema() {
        let dataset = Dataset::from_rows(
            vec![],
            vec![
                row(json!({"int": 1, "mixed": 1, "flag": true, "name": "x", "empty": null, "odd": 1})),
                row(json!({"int": 2, "mixed": 2.5, "flag": false, "name": "y", "empty": null, "odd": "two"})),
            ],
        );

        let schema = dataset.infer_schema();
        let types: Vec<(&str, &str)> = schema
            .iter()
            .map(|f| (f.name.as_str(), f.column_type.as_str()))
            .collect();

        assert_eq!(
            types,
            vec![
                ("int", "INTEGER"),
                ("mixed", "FLOAT"),
                ("flag", "BOOLEAN"),
                ("name", "STRING"),
                ("empty", "STRING"),
                ("odd", "STRING"),
            ]
        );
    }

    #[test]
    fn test_nested_values_become_json_text() {
        let dataset = Dataset::from_rows(vec![], vec![row(json!({"tags": ["a", "b"]}))]);
        assert_eq!(dataset.rows()[0]["tags"], json!(r#"["a","b"]"#));
    }

    #[test]
    fn test_push_and_drop_column() {
        let mut dataset = Dataset::from_rows(vec![], vec![row(json!({"a": 1})), row(json!({"a": 2}))]);

        dataset
            .push_column("longitude", vec![json!(-105.0), Value::Null])
            .unwrap();
        assert_eq!(dataset.columns(), ["a", "longitude"]);
        assert_eq!(
            dataset.column("longitude").unwrap(),
            vec![&json!(-105.0), &Value::Null]
        );

        assert!(matches!(
            dataset.push_column("latitude", vec![json!(1.0)]),
            Err(DatasetError::ColumnLength { expected: 2, actual: 1, .. })
        ));

        assert!(dataset.drop_column("a"));
        assert!(!dataset.drop_column("a"));
        assert_eq!(dataset.columns(), ["longitude"]);
        assert!(!dataset.rows()[0].contains_key("a"));
    }

    #[test]
    fn test_ndjson_one_object_per_line() {
        let dataset = Dataset::from_rows(
            vec![],
            vec![row(json!({"id": 1, "code": "A"})), row(json!({"id": 2, "code": 7}))],
        );
        let text = String::from_utf8(dataset.to_ndjson().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"id":1,"code":"A"}"#);
        // Colonne STRING : le nombre est chargé en texte
        assert_eq!(lines[1], r#"{"id":2,"code":"7"}"#);
        assert!(text.ends_with('\n'));
    }
}

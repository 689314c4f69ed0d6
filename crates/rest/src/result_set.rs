//! XNAT JSON listing format
//!
//! Collection requests with `?format=json` answer with
//! `{"ResultSet": {"Result": [ ... ]}}`, one flat row of string fields per
//! child. Field names differ between collection types.

use qx_core::{EntityType, Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One listing row
pub type Row = Map<String, Value>;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "ResultSet")]
    result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(rename = "Result", default)]
    result: Vec<Row>,
}

/// Parse a listing response body
pub fn parse_rows(body: &str) -> Result<Vec<Row>> {
    let envelope: Envelope = serde_json::from_str(body).map_err(Error::Json)?;
    Ok(envelope.result_set.result)
}

/// The fields of a listing row the client needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFields {
    pub id: String,
    pub label: String,
    pub xsi_type: Option<String>,
    pub size: Option<u64>,
}

impl RowFields {
    /// The URI path segment naming this child in its collection
    pub fn uri_segment(&self, entity: EntityType) -> &str {
        if entity.is_resource() || entity == EntityType::File {
            &self.label
        } else {
            &self.id
        }
    }
}

fn field(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Extract identifier, label, type and size from a row
///
/// Returns `None` when the row lacks an identifier.
pub fn row_fields(entity: EntityType, row: &Row) -> Option<RowFields> {
    let fields = match entity {
        EntityType::Project => {
            let id = field(row, &["ID", "id"])?;
            RowFields {
                label: id.clone(),
                id,
                xsi_type: None,
                size: None,
            }
        }
        EntityType::Subject | EntityType::Experiment | EntityType::Assessor => {
            let id = field(row, &["ID", "id"])?;
            RowFields {
                label: field(row, &["label"]).unwrap_or_else(|| id.clone()),
                id,
                xsi_type: field(row, &["xsiType"]),
                size: None,
            }
        }
        EntityType::Scan => {
            let id = field(row, &["ID", "id"])?;
            RowFields {
                label: id.clone(),
                id,
                xsi_type: field(row, &["xsiType"]),
                size: None,
            }
        }
        EntityType::Resource | EntityType::InResource | EntityType::OutResource => {
            let label = field(row, &["label"])?;
            RowFields {
                id: field(row, &["xnat_abstractresource_id"]).unwrap_or_else(|| label.clone()),
                label,
                xsi_type: None,
                size: None,
            }
        }
        EntityType::File => {
            let name = field(row, &["Name", "name"])?;
            RowFields {
                id: name.clone(),
                label: name,
                xsi_type: None,
                size: field(row, &["Size", "size"]).and_then(|s| s.parse().ok()),
            }
        }
    };
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows() {
        let body = r#"{"ResultSet": {"Result": [
            {"ID": "QIN_S00580", "label": "Breast003", "project": "QIN"},
            {"ID": "QIN_S00581", "label": "Breast004", "project": "QIN"}
        ], "totalRecords": "2"}}"#;
        let rows = parse_rows(body).unwrap();
        assert_eq!(rows.len(), 2);
        let fields = row_fields(EntityType::Subject, &rows[1]).unwrap();
        assert_eq!(fields.id, "QIN_S00581");
        assert_eq!(fields.label, "Breast004");
        assert_eq!(fields.uri_segment(EntityType::Subject), "QIN_S00581");
    }

    #[test]
    fn test_parse_empty_result() {
        let rows = parse_rows(r#"{"ResultSet": {"totalRecords": "0"}}"#).unwrap();
        assert!(rows.is_empty());
        assert!(parse_rows("<html>login</html>").is_err());
    }

    #[test]
    fn test_experiment_fields() {
        let rows = parse_rows(
            r#"{"ResultSet": {"Result": [{"ID": "QIN_E00604", "label": "Breast003_Session01",
                "xsiType": "xnat:mrSessionData", "date": "2015-03-02"}]}}"#,
        )
        .unwrap();
        let fields = row_fields(EntityType::Experiment, &rows[0]).unwrap();
        assert_eq!(fields.label, "Breast003_Session01");
        assert_eq!(fields.xsi_type.as_deref(), Some("xnat:mrSessionData"));
    }

    #[test]
    fn test_resource_and_file_fields() {
        let rows = parse_rows(
            r#"{"ResultSet": {"Result": [
                {"xnat_abstractresource_id": 1234, "label": "NIFTI", "format": "NIFTI"}
            ]}}"#,
        )
        .unwrap();
        let resource = row_fields(EntityType::Resource, &rows[0]).unwrap();
        assert_eq!(resource.id, "1234");
        assert_eq!(resource.uri_segment(EntityType::Resource), "NIFTI");

        let rows = parse_rows(
            r#"{"ResultSet": {"Result": [
                {"Name": "volume001.nii.gz", "Size": "352", "URI": "/data/x"}
            ]}}"#,
        )
        .unwrap();
        let file = row_fields(EntityType::File, &rows[0]).unwrap();
        assert_eq!(file.label, "volume001.nii.gz");
        assert_eq!(file.size, Some(352));
    }

    #[test]
    fn test_row_without_identifier_is_skipped() {
        let rows = parse_rows(r#"{"ResultSet": {"Result": [{"label": "orphan"}]}}"#).unwrap();
        assert_eq!(row_fields(EntityType::Subject, &rows[0]), None);
    }
}

use serde_json::Value;

use crate::{AttendanceRecord, SourceError};

/// Anything that can supply attendance records: a fixture file, a database query, an HTTP API.
///
/// The aggregation only consumes the materialized list.
pub trait AttendanceSource {
    fn records(&self) -> Result<Vec<AttendanceRecord>, SourceError>;
}

impl AttendanceSource for Vec<AttendanceRecord> {
    fn records(&self) -> Result<Vec<AttendanceRecord>, SourceError> {
        Ok(self.clone())
    }
}

/// Keys under which a JSON object may carry the record list.
const LIST_KEYS: [&str; 2] = ["records", "participacoes"];

/// Decode records from JSON: either a bare array or an object holding the array under
/// `records` (or `participacoes`). `origin` names the input in error messages.
pub fn decode_records(json: &[u8], origin: &str) -> Result<Vec<AttendanceRecord>, SourceError> {
    let decode_err = |source| SourceError::Decode {
        origin: origin.to_string(),
        source,
    };
    let value: Value = serde_json::from_slice(json).map_err(decode_err)?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => LIST_KEYS
            .iter()
            .find_map(|key| map.remove(*key))
            .ok_or_else(|| SourceError::Shape {
                origin: origin.to_string(),
                message: format!("expected an array or an object with one of {LIST_KEYS:?}"),
            })?,
        other => {
            return Err(SourceError::Shape {
                origin: origin.to_string(),
                message: format!("expected an array of records, found {other}"),
            })
        }
    };
    serde_json::from_value(list).map_err(decode_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_bare_and_wrapped_lists() {
        let bare = br#"[{"entity_id": "1", "entity_name": "Ana", "entity_code": "9", "activity_date": "2025-10-03"}]"#;
        let wrapped = br#"{"participacoes": [{"membro_id": 1, "nome": "Ana", "matricula": 9, "data_operacao": "2025-10-03"}]}"#;

        let expected = vec![AttendanceRecord::new(
            "1",
            "Ana",
            "9",
            NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
        )];
        assert_eq!(decode_records(bare, "bare.json").unwrap(), expected);
        assert_eq!(decode_records(wrapped, "wrapped.json").unwrap(), expected);
    }

    #[test]
    fn wrong_shapes_name_the_origin() {
        let err = decode_records(br#"{"rows": []}"#, "fixture.json").unwrap_err();
        assert!(matches!(err, SourceError::Shape { .. }), "{err:?}");
        assert!(err.to_string().contains("fixture.json"));

        let err = decode_records(b"42", "fixture.json").unwrap_err();
        assert!(matches!(err, SourceError::Shape { .. }), "{err:?}");

        let err = decode_records(b"[{", "fixture.json").unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }), "{err:?}");
    }

    #[test]
    fn vec_is_a_static_source() {
        let records = vec![AttendanceRecord::new(
            "1",
            "Ana",
            "9",
            NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
        )];
        assert_eq!(records.records().unwrap(), records);
    }
}

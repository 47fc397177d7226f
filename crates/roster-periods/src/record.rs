use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::PeriodError;

/// Participation states that count as attendance.
pub const ATTENDING_STATUSES: [&str; 2] = ["CONFIRMADO", "ADICIONADO_SUP"];

fn default_entity_name() -> String {
    "Servidor".to_string()
}

/// One (person, day) attendance fact as delivered by the data source.
///
/// Field names follow the source systems: `membro_id`/`servidor_id`, `servidor_nome`/`nome`,
/// `matricula` and `data_operacao`/`dataOperacao` are accepted alongside the canonical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(
        alias = "membro_id",
        alias = "servidor_id",
        deserialize_with = "string_or_number"
    )]
    pub entity_id: String,
    #[serde(
        alias = "servidor_nome",
        alias = "nome",
        default = "default_entity_name"
    )]
    pub entity_name: String,
    #[serde(alias = "matricula", default, deserialize_with = "string_or_number")]
    pub entity_code: String,
    #[serde(
        alias = "data_operacao",
        alias = "dataOperacao",
        deserialize_with = "activity_date"
    )]
    pub activity_date: NaiveDate,
    #[serde(alias = "estado_visual", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(alias = "ativa", default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl AttendanceRecord {
    pub fn new(
        entity_id: impl Into<String>,
        entity_name: impl Into<String>,
        entity_code: impl Into<String>,
        activity_date: NaiveDate,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_name: entity_name.into(),
            entity_code: entity_code.into(),
            activity_date,
            status: None,
            active: None,
        }
    }

    /// Whether this record counts as attendance: not flagged inactive, and with an attending
    /// status when it carries one.
    pub fn is_attending(&self) -> bool {
        self.active != Some(false)
            && self
                .status
                .as_deref()
                .map_or(true, |status| ATTENDING_STATUSES.contains(&status))
    }
}

/// Parse an activity date: `YYYY-MM-DD`, or a date-time (RFC 3339, or without offset) of which
/// only the calendar date is kept.
pub fn parse_activity_date(value: &str) -> Result<NaiveDate, PeriodError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .map_err(|_| PeriodError::InvalidDate {
            value: value.to_string(),
        })
}

fn activity_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_activity_date(&raw).map_err(serde::de::Error::custom)
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(value) => value,
        Raw::Signed(value) => value.to_string(),
        Raw::Unsigned(value) => value.to_string(),
    })
}

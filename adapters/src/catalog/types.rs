use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use grid::types::{DayKind, PriceRule};

use crate::catalog::errors::CatalogError;

const TIME_FMT: &str = "%H:%M";

/// Wire form of one configured pricing interval.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRuleDto {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub day_kind: Option<String>,
    pub regular_price: u64,
    pub daily_price: u64,
    pub student_price: u64,
}

impl PriceRuleDto {
    pub fn into_rule(self) -> Result<PriceRule, CatalogError> {
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;

        let day_kind = match self.day_kind.as_deref() {
            None => None,
            Some("weekday") => Some(DayKind::Weekday),
            Some("weekend") => Some(DayKind::Weekend),
            Some(other) => {
                return Err(CatalogError::InvalidRule(format!(
                    "unknown day kind '{other}'"
                )));
            }
        };

        Ok(PriceRule {
            start,
            end,
            day_kind,
            regular_price: self.regular_price,
            daily_price: self.daily_price,
            student_price: self.student_price,
        })
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, CatalogError> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .map_err(|e| CatalogError::InvalidRule(format!("bad time '{s}': {e}")))
}

/// Slot-sync payload mirrored to the catalog collaborator whenever bucket
/// status transitions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUpdate {
    pub resource_id: u64,
    pub date: String,
    pub status: String,
    pub slots: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(start: &str, end: &str, day_kind: Option<&str>) -> PriceRuleDto {
        PriceRuleDto {
            start: start.to_string(),
            end: end.to_string(),
            day_kind: day_kind.map(str::to_string),
            regular_price: 8_000,
            daily_price: 6_000,
            student_price: 4_000,
        }
    }

    #[test]
    fn maps_wire_rule_to_domain() {
        let rule = dto("09:00", "11:00", Some("weekend")).into_rule().unwrap();

        assert_eq!(rule.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(rule.end, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(rule.day_kind, Some(DayKind::Weekend));
        assert_eq!(rule.regular_price, 8_000);
    }

    #[test]
    fn missing_day_kind_means_every_day() {
        let rule = dto("09:00", "11:00", None).into_rule().unwrap();
        assert_eq!(rule.day_kind, None);
    }

    #[test]
    fn rejects_malformed_time_and_day_kind() {
        assert!(dto("9am", "11:00", None).into_rule().is_err());
        assert!(dto("09:00", "11:00", Some("holiday")).into_rule().is_err());
    }

    #[test]
    fn slot_update_serializes_with_wire_field_names() {
        let update = SlotUpdate {
            resource_id: 7,
            date: "2025-06-09".to_string(),
            status: "Booked".to_string(),
            slots: BTreeMap::from([("court 7".to_string(), vec!["10:00".to_string()])]),
        };

        let v = serde_json::to_value(&update).unwrap();
        assert_eq!(v["resourceId"], 7);
        assert_eq!(v["slots"]["court 7"][0], "10:00");
    }
}

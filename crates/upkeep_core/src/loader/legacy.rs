//! Field-level upgrades for records written by older app versions.
//!
//! Operates on raw JSON so that shapes the current model cannot parse still
//! load. Every function returns whether it changed the record.

use crate::storage::CollectionKey;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static DOTTED_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2})\.(\d{1,2})\.(\d{4})\s*$").expect("valid dotted date regex")
});

const ID_FIELDS: &[&str] = &["id", "contractId", "objectId", "engineerId", "taskId"];

/// Contract fields that older writers stored as `null` and that decode to a default.
const CONTRACT_DEFAULTED_FIELDS: &[&str] = &[
    "status",
    "equipmentType",
    "workTypes",
    "assignedEngineerIds",
    "maintenancePeriods",
];
const PERIOD_DEFAULTED_FIELDS: &[&str] = &["status", "departments"];

/// Upgrades one record of `key` in place.
pub(crate) fn migrate_record(key: CollectionKey, record: &mut Value) -> bool {
    let Some(object) = record.as_object_mut() else {
        return false;
    };

    let mut changed = stringify_ids(object);
    changed |= match key {
        CollectionKey::Contracts => migrate_contract(object),
        CollectionKey::Tasks => normalize_dates(object, &["scheduledDate", "completedDate"]),
        CollectionKey::MaintenanceReports => normalize_dates(object, &["date"]),
        _ => false,
    };
    changed
}

fn migrate_contract(contract: &mut Map<String, Value>) -> bool {
    let mut changed = drop_null_fields(contract, CONTRACT_DEFAULTED_FIELDS);
    changed |= normalize_dates(contract, &["startDate", "endDate"]);

    if !contract.contains_key("status") {
        contract.insert("status".to_string(), Value::from("active"));
        changed = true;
    }

    if let Some(legacy) = contract.remove("frequency") {
        if !contract.contains_key("frequencyMonths") {
            if let Some(months) = frequency_months(&legacy) {
                contract.insert("frequencyMonths".to_string(), Value::from(months));
            }
        }
        changed = true;
    }

    changed |= synthesize_periods(contract);
    changed |= widen_engineer_assignment(contract);

    if let Some(Value::Array(periods)) = contract.get_mut("maintenancePeriods") {
        for (index, period) in periods.iter_mut().enumerate() {
            if let Some(period) = period.as_object_mut() {
                changed |= migrate_period(index, period);
            }
        }
    }

    changed
}

/// Maps legacy frequency labels to a month interval.
pub(crate) fn frequency_months(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(label) => match label.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "monthly" => Some(1),
            "bimonthly" => Some(2),
            "quarterly" => Some(3),
            "semi_annual" | "semi_annually" | "semiannual" | "biannual" | "half_yearly" => Some(6),
            "annual" | "annually" | "yearly" => Some(12),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

fn synthesize_periods(contract: &mut Map<String, Value>) -> bool {
    let start = contract.remove("maintenanceStartDate");
    let end = contract.remove("maintenanceEndDate");
    let had_legacy = start.is_some() || end.is_some();

    let has_periods = matches!(
        contract.get("maintenancePeriods"),
        Some(Value::Array(periods)) if !periods.is_empty()
    );
    if has_periods {
        return had_legacy;
    }

    match (start, end) {
        (Some(start), Some(end)) if !start.is_null() && !end.is_null() => {
            let mut period = Map::new();
            period.insert("id".to_string(), Value::from("period-1"));
            period.insert("startDate".to_string(), start);
            period.insert("endDate".to_string(), end);
            period.insert("status".to_string(), Value::from("planned"));
            contract.insert(
                "maintenancePeriods".to_string(),
                Value::Array(vec![Value::Object(period)]),
            );
            true
        }
        _ => {
            if !contract.contains_key("maintenancePeriods") {
                contract.insert("maintenancePeriods".to_string(), Value::Array(Vec::new()));
                return true;
            }
            had_legacy
        }
    }
}

fn widen_engineer_assignment(contract: &mut Map<String, Value>) -> bool {
    let Some(single) = contract.remove("assignedEngineerId") else {
        return false;
    };

    let has_set = matches!(
        contract.get("assignedEngineerIds"),
        Some(Value::Array(ids)) if !ids.is_empty()
    );
    if !has_set {
        let ids = match id_string(&single) {
            Some(id) if !id.is_empty() => vec![Value::from(id)],
            _ => Vec::new(),
        };
        contract.insert("assignedEngineerIds".to_string(), Value::Array(ids));
    }
    true
}

fn migrate_period(index: usize, period: &mut Map<String, Value>) -> bool {
    let mut changed = drop_null_fields(period, PERIOD_DEFAULTED_FIELDS);
    changed |= stringify_ids(period);
    changed |= normalize_dates(
        period,
        &["startDate", "endDate", "adjustedStartDate", "adjustedEndDate"],
    );

    let missing_id = period
        .get("id")
        .and_then(Value::as_str)
        .map_or(true, |id| id.trim().is_empty());
    if missing_id {
        period.insert("id".to_string(), Value::from(format!("period-{}", index + 1)));
        changed = true;
    }

    if !period.contains_key("status") {
        let adjusted = ["adjustedStartDate", "adjustedEndDate"]
            .iter()
            .any(|field| period.get(*field).is_some_and(|v| !v.is_null()));
        let status = if adjusted { "adjusted" } else { "planned" };
        period.insert("status".to_string(), Value::from(status));
        changed = true;
    }

    changed
}

/// Removes `null` entries so the field falls back to its default.
fn drop_null_fields(record: &mut Map<String, Value>, fields: &[&str]) -> bool {
    let mut changed = false;
    for field in fields {
        if record.get(*field).is_some_and(Value::is_null) {
            record.remove(*field);
            changed = true;
        }
    }
    changed
}

fn stringify_ids(record: &mut Map<String, Value>) -> bool {
    let mut changed = false;
    for field in ID_FIELDS {
        if let Some(value) = record.get_mut(*field) {
            if value.is_number() {
                if let Some(id) = id_string(value) {
                    *value = Value::from(id);
                    changed = true;
                }
            }
        }
    }
    if let Some(Value::Array(ids)) = record.get_mut("assignedEngineerIds") {
        for value in ids.iter_mut().filter(|value| value.is_number()) {
            if let Some(id) = id_string(value) {
                *value = Value::from(id);
                changed = true;
            }
        }
    }
    changed
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn normalize_dates(record: &mut Map<String, Value>, fields: &[&str]) -> bool {
    let mut changed = false;
    for field in fields {
        let Some(value) = record.get_mut(*field) else {
            continue;
        };
        let Some(raw) = value.as_str() else {
            continue;
        };
        if let Some(date) = parse_legacy_date(raw) {
            let normalized = date.format("%Y-%m-%d").to_string();
            if normalized != raw {
                *value = Value::from(normalized);
                changed = true;
            }
        }
    }
    changed
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and `DD.MM.YYYY`.
pub(crate) fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }
    let caps = DOTTED_DATE_RE.captures(trimmed)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::{frequency_months, migrate_record, parse_legacy_date};
    use crate::storage::CollectionKey;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn legacy_dates_normalize() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(parse_legacy_date("2024-03-01"), expected);
        assert_eq!(parse_legacy_date("2024-03-01T10:00:00.000Z"), expected);
        assert_eq!(parse_legacy_date("01.03.2024"), expected);
        assert_eq!(parse_legacy_date("March 1st"), None);
    }

    #[test]
    fn frequency_labels_collapse_to_months() {
        assert_eq!(frequency_months(&json!("quarterly")), Some(3));
        assert_eq!(frequency_months(&json!("semi-annual")), Some(6));
        assert_eq!(frequency_months(&json!(12)), Some(12));
        assert_eq!(frequency_months(&json!("sometimes")), None);
    }

    #[test]
    fn legacy_contract_gains_current_shape() {
        let mut record = json!({
            "id": 1700000000000u64,
            "contractNumber": "A-1",
            "clientName": "ACME",
            "objectId": 42,
            "startDate": "2024-01-01T00:00:00.000Z",
            "endDate": "31.12.2024",
            "frequency": "quarterly",
            "maintenanceStartDate": "2024-03-01",
            "maintenanceEndDate": "2024-03-15",
            "assignedEngineerId": 7
        });

        assert!(migrate_record(CollectionKey::Contracts, &mut record));
        assert_eq!(record["id"], json!("1700000000000"));
        assert_eq!(record["objectId"], json!("42"));
        assert_eq!(record["startDate"], json!("2024-01-01"));
        assert_eq!(record["endDate"], json!("2024-12-31"));
        assert_eq!(record["status"], json!("active"));
        assert_eq!(record["frequencyMonths"], json!(3));
        assert_eq!(record["assignedEngineerIds"], json!(["7"]));
        assert_eq!(record["maintenancePeriods"][0]["status"], json!("planned"));
        assert!(record.get("maintenanceStartDate").is_none());

        assert!(!migrate_record(CollectionKey::Contracts, &mut record));
    }

    #[test]
    fn null_collections_and_labels_fall_back_to_defaults() {
        let mut record = json!({
            "id": "c1",
            "status": null,
            "equipmentType": null,
            "workTypes": null,
            "assignedEngineerIds": null,
            "maintenancePeriods": [
                {"id": "p1", "startDate": "2024-03-01", "endDate": "2024-03-10",
                 "status": null, "departments": null}
            ]
        });

        assert!(migrate_record(CollectionKey::Contracts, &mut record));
        assert_eq!(record["status"], json!("active"));
        assert!(record.get("equipmentType").is_none());
        assert!(record.get("workTypes").is_none());
        assert!(record.get("assignedEngineerIds").is_none());
        assert_eq!(record["maintenancePeriods"][0]["status"], json!("planned"));
        assert!(record["maintenancePeriods"][0].get("departments").is_none());
    }

    #[test]
    fn period_status_backfill_respects_adjustment() {
        let mut record = json!({
            "id": "c1",
            "status": "active",
            "maintenancePeriods": [
                {"id": "p1", "startDate": "2024-03-01", "endDate": "2024-03-10",
                 "adjustedStartDate": "2024-03-05"},
                {"id": "p2", "startDate": "2024-06-01", "endDate": "2024-06-10",
                 "status": "completed"}
            ]
        });

        migrate_record(CollectionKey::Contracts, &mut record);
        assert_eq!(record["maintenancePeriods"][0]["status"], json!("adjusted"));
        assert_eq!(record["maintenancePeriods"][1]["status"], json!("completed"));
    }
}

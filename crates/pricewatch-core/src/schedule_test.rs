use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::json;

use super::*;

fn spec(id: i64, term: &str, frequency_days: u32, at: &str, active: bool) -> SearchSpec {
    serde_json::from_value(json!({
        "id": id,
        "search_term": term,
        "is_active": active,
        "frequency_days": frequency_days,
        "preferred_time": at,
        "source_websites": [
            {"id": 1, "name": "OLX", "base_url": "https://www.olx.com.br", "is_active": true},
            {"id": 2, "name": "MERCADO_LIVRE", "base_url": "https://lista.mercadolivre.com.br", "is_active": true},
            {"id": 3, "name": "ENJOEI", "base_url": "https://www.enjoei.com.br", "is_active": false}
        ]
    }))
    .expect("valid search spec")
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
}

fn built_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

#[test]
fn build_creates_one_entry_per_active_site() {
    let table = ScheduleTable::build(&[spec(7, "bicicleta", 1, "09:00:00", true)], built_at());

    let keys: Vec<&str> = table.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["run_search_7_mercado_livre", "run_search_7_olx"]);
    assert!(table.entries.iter().all(|e| e.term == "bicicleta"));
}

#[test]
fn build_skips_inactive_searches() {
    let table = ScheduleTable::build(
        &[
            spec(1, "fogão", 1, "08:00:00", false),
            spec(2, "geladeira", 1, "08:00:00", true),
        ],
        built_at(),
    );
    assert!(table.entries.iter().all(|e| e.search_id == 2));
    assert_eq!(table.len(), 2);
}

#[test]
fn resync_rebuild_drops_disabled_search() {
    let mut specs = vec![
        spec(1, "fogão", 1, "08:00:00", true),
        spec(2, "geladeira", 2, "10:30:00", true),
    ];
    let before = ScheduleTable::build(&specs, built_at());
    assert_eq!(before.len(), 4);

    specs[0].is_active = false;
    let after = ScheduleTable::build(&specs, built_at() + Duration::seconds(60));

    assert_eq!(after.len(), 2);
    assert!(after.entries.iter().all(|e| e.search_id == 2));
    assert!(!after.entries.iter().any(|e| e.key.starts_with("run_search_1_")));
}

#[test]
fn empty_table_has_no_entries() {
    assert!(ScheduleTable::empty().is_empty());
}

// ---------------------------------------------------------------------------
// Recurrence
// ---------------------------------------------------------------------------

#[test]
fn every_three_days_fires_only_on_matching_days_at_preferred_minute() {
    let table = ScheduleTable::build(&[spec(9, "sofa", 3, "09:00:00", true)], built_at());
    let entry = &table.entries[0];

    // 1970-01-04 is day 3 since the epoch.
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let mut due_days = Vec::new();
    for offset in 0..10 {
        let day = epoch + Duration::days(offset);
        if entry.is_due(at(day, 9, 0)) {
            due_days.push(offset);
        }
    }
    assert_eq!(due_days, vec![0, 3, 6, 9]);

    let due_day = epoch + Duration::days(3);
    assert!(!entry.is_due(at(due_day, 9, 1)));
    assert!(!entry.is_due(at(due_day, 8, 59)));
    assert!(!entry.is_due(at(due_day, 21, 0)));
}

#[test]
fn due_ignores_seconds_within_the_minute() {
    let table = ScheduleTable::build(&[spec(4, "mesa", 1, "14:15:00", true)], built_at());
    let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let now = day.and_time(NaiveTime::from_hms_opt(14, 15, 42).unwrap());
    assert_eq!(table.due(now).count(), 2);
}

#[test]
fn daily_entries_fire_every_day() {
    let table = ScheduleTable::build(&[spec(5, "cadeira", 1, "00:00:00", true)], built_at());
    let start = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
    for offset in 0..5 {
        assert_eq!(table.due(at(start + Duration::days(offset), 0, 0)).count(), 2);
    }
}

#[test]
fn entries_with_same_frequency_fire_on_the_same_day() {
    let table = ScheduleTable::build(
        &[
            spec(1, "fogão", 2, "07:00:00", true),
            spec(2, "geladeira", 2, "07:00:00", true),
        ],
        built_at(),
    );
    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let due = table.due(at(day, 7, 0)).count();
    assert!(due == 0 || due == 4, "got {due}");
    let next = table.due(at(day + Duration::days(1), 7, 0)).count();
    assert_eq!(due + next, 4);
}

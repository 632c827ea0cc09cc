use itertools::Itertools;
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::data::{
    Conflict, ConflictKind, Schedule, Statistics, ValidationResult, Weekday, resource_name,
};

// (day, slot, teacher or room name)
type ClaimKey = (Weekday, String, String);

/// Tracks which timetable first claimed each teacher and each room per cell.
/// Teachers and rooms live in separate key spaces.
#[derive(Debug, Default)]
struct ConflictScanner {
    teachers: HashMap<ClaimKey, usize>,
    rooms: HashMap<ClaimKey, usize>,
    conflicts: Vec<Conflict>,
}

impl ConflictScanner {
    fn scan_cell(&mut self, timetable: usize, day: Weekday, slot: &str, teacher: &str, room: &str) {
        let teacher_clash = claim(
            &mut self.teachers,
            ConflictKind::Teacher,
            timetable,
            day,
            slot,
            teacher,
        );
        let room_clash = claim(&mut self.rooms, ConflictKind::Room, timetable, day, slot, room);
        self.conflicts.extend(teacher_clash);
        self.conflicts.extend(room_clash);
    }

    fn finish(self, total_timetables: usize) -> ValidationResult {
        let statistics = Statistics {
            total_timetables,
            unique_teachers_used: self.teachers.keys().map(|(_, _, name)| name).unique().count(),
            unique_rooms_used: self.rooms.keys().map(|(_, _, name)| name).unique().count(),
            total_classes_scheduled: self.teachers.len(),
        };
        info!(
            "Scanned {} timetables: {} conflicts, {} classes, {} teachers, {} rooms",
            statistics.total_timetables,
            self.conflicts.len(),
            statistics.total_classes_scheduled,
            statistics.unique_teachers_used,
            statistics.unique_rooms_used
        );
        for conflict in &self.conflicts {
            debug!(
                "{} (timetables {} and {})",
                conflict, conflict.first_timetable, conflict.timetable
            );
        }
        ValidationResult {
            valid: self.conflicts.is_empty(),
            conflicts: self.conflicts.iter().map(ToString::to_string).collect(),
            conflict_details: self.conflicts,
            warnings: Vec::new(),
            statistics,
        }
    }
}

fn claim(
    claims: &mut HashMap<ClaimKey, usize>,
    kind: ConflictKind,
    timetable: usize,
    day: Weekday,
    slot: &str,
    resource: &str,
) -> Option<Conflict> {
    if resource.is_empty() {
        return None;
    }
    match claims.entry((day, slot.to_string(), resource.to_string())) {
        Entry::Occupied(first) => Some(Conflict {
            kind,
            day,
            time_slot: slot.to_string(),
            resource: resource.to_string(),
            first_timetable: *first.get(),
            timetable,
        }),
        Entry::Vacant(vacant) => {
            vacant.insert(timetable);
            None
        }
    }
}

fn cell_resource(cell: &Map<String, Value>, field: &str) -> String {
    cell.get(field).and_then(resource_name).unwrap_or_default()
}

/// Scans untyped timetables for teachers or rooms booked twice in one cell.
/// Cells are visited in the order each day mapping lists them, so conflicts
/// come out in first-seen order.
///
/// Anything that is not shaped like a timetable is skipped rather than
/// rejected; only a non-list input makes the whole scan fail, and even then
/// the failure is returned as data.
pub fn detect_conflicts(timetables: &Value, days: &[Weekday]) -> ValidationResult {
    let Some(timetables) = timetables.as_array() else {
        return ValidationResult::malformed("Timetable data must be a list of timetables");
    };
    let days: Vec<Weekday> = days.iter().copied().unique().collect();

    let mut scanner = ConflictScanner::default();
    for (index, timetable) in timetables.iter().enumerate() {
        for &day in &days {
            let Some(cells) = timetable.get(day.as_str()).and_then(Value::as_object) else {
                continue;
            };
            for (slot, cell) in cells {
                let Some(cell) = cell.as_object() else {
                    continue;
                };
                scanner.scan_cell(
                    index,
                    day,
                    slot,
                    &cell_resource(cell, "teacher"),
                    &cell_resource(cell, "room"),
                );
            }
        }
    }
    scanner.finish(timetables.len())
}

/// Same scan over validated timetables. Gives the same result as
/// `detect_conflicts` over the timetables they were read from.
pub fn detect_schedule_conflicts(schedules: &[Schedule], days: &[Weekday]) -> ValidationResult {
    let days: Vec<Weekday> = days.iter().copied().unique().collect();

    let mut scanner = ConflictScanner::default();
    for (index, schedule) in schedules.iter().enumerate() {
        for &day in &days {
            let Some(day_schedule) = schedule.day(day) else {
                continue;
            };
            for (slot, assignment) in day_schedule.cells() {
                scanner.scan_cell(
                    index,
                    day,
                    slot,
                    &assignment.teacher_name().unwrap_or_default(),
                    &assignment.room_name().unwrap_or_default(),
                );
            }
        }
    }
    scanner.finish(schedules.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{blank_timetable, book};
    use crate::validator::validate;
    use serde_json::json;

    fn monday_nine(batch: &str, course: &str, teacher: &str, room: &str) -> Value {
        let timetable = blank_timetable("BTech", batch);
        book(timetable, "monday", "9:00-10:00", course, teacher, room)
    }

    fn pair_with(teacher_a: &str, room_a: &str, teacher_b: &str, room_b: &str) -> Value {
        json!([
            monday_nine("A", "CS101", teacher_a, room_a),
            monday_nine("B", "MA101", teacher_b, room_b),
        ])
    }

    #[test]
    fn empty_batch_is_valid() {
        let result = detect_conflicts(&json!([]), &Weekday::WORKWEEK);
        assert!(result.valid);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.statistics, Statistics::default());
        assert_eq!(
            serde_json::to_value(&result.statistics).unwrap(),
            json!({
                "total_timetables": 0,
                "unique_teachers_used": 0,
                "unique_rooms_used": 0,
                "total_classes_scheduled": 0
            })
        );
    }

    #[test]
    fn blank_timetable_books_nothing() {
        let result = detect_conflicts(&json!([blank_timetable("BTech", "A")]), &Weekday::ALL);
        assert!(result.valid);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.statistics.total_timetables, 1);
        assert_eq!(result.statistics.total_classes_scheduled, 0);
    }

    #[test]
    fn missing_day_is_skipped() {
        let mut timetable = blank_timetable("BTech", "A");
        timetable.as_object_mut().unwrap().remove("saturday");
        let timetable = book(timetable, "friday", "7:00-8:00", "CS101", "Dr. Smith", "R-101");
        let result = detect_conflicts(&json!([timetable]), &Weekday::ALL);
        assert!(result.valid);
        assert_eq!(result.statistics.total_classes_scheduled, 1);
    }

    #[test]
    fn shared_teacher_is_reported_once() {
        let result = detect_conflicts(
            &pair_with("Dr. Smith", "R-101", "Dr. Smith", "R-102"),
            &Weekday::WORKWEEK,
        );
        assert!(!result.valid);
        assert_eq!(
            result.conflicts,
            vec!["Teacher conflict: Dr. Smith scheduled at monday 9:00-10:00 in multiple classes"]
        );
        assert_eq!(
            result.conflict_details,
            vec![Conflict {
                kind: ConflictKind::Teacher,
                day: Weekday::Monday,
                time_slot: "9:00-10:00".to_string(),
                resource: "Dr. Smith".to_string(),
                first_timetable: 0,
                timetable: 1,
            }]
        );
    }

    #[test]
    fn shared_room_is_not_a_teacher_conflict() {
        let result = detect_conflicts(
            &pair_with("Dr. Smith", "R-101", "Prof. Jones", "R-101"),
            &Weekday::WORKWEEK,
        );
        assert!(!result.valid);
        assert_eq!(result.conflict_details.len(), 1);
        assert_eq!(result.conflict_details[0].kind, ConflictKind::Room);
        assert!(result.conflicts[0].contains("R-101"));
        assert!(!result.conflicts.iter().any(|c| c.starts_with("Teacher")));
        assert_eq!(result.statistics.unique_teachers_used, 2);
        assert_eq!(result.statistics.unique_rooms_used, 1);
    }

    #[test]
    fn teacher_and_room_names_do_not_collide() {
        let result = detect_conflicts(&pair_with("Lab", "R-1", "Dr. Smith", "Lab"), &Weekday::ALL);
        assert!(result.valid);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn every_extra_claim_is_reported() {
        let timetables: Vec<Value> = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, batch)| {
                book(
                    blank_timetable("BTech", batch),
                    "wednesday",
                    "14:00-15:00",
                    "CS101",
                    "Dr. Smith",
                    &format!("R-{}", i),
                )
            })
            .collect();
        let result = detect_conflicts(&Value::Array(timetables), &Weekday::WORKWEEK);
        assert_eq!(result.conflict_details.len(), 2);
        assert_eq!(result.conflict_details[0].timetable, 1);
        assert_eq!(result.conflict_details[1].timetable, 2);
        assert!(result.conflict_details.iter().all(|c| c.first_timetable == 0));
        assert_eq!(result.statistics.total_classes_scheduled, 1);
    }

    #[test]
    fn same_teacher_in_other_slots_is_fine() {
        let first = monday_nine("A", "CS101", "Dr. Smith", "R-101");
        let second = blank_timetable("BTech", "B");
        let second = book(second, "monday", "10:00-11:00", "CS101", "Dr. Smith", "R-101");
        let second = book(second, "tuesday", "9:00-10:00", "CS101", "Dr. Smith", "R-101");
        let result = detect_conflicts(&json!([first, second]), &Weekday::WORKWEEK);
        assert!(result.valid);
        assert_eq!(result.statistics.total_classes_scheduled, 3);
        assert_eq!(result.statistics.unique_teachers_used, 1);
        assert_eq!(result.statistics.unique_rooms_used, 1);
    }

    #[test]
    fn saturday_is_ignored_unless_scanned() {
        let saturday = |batch| {
            let timetable = blank_timetable("BTech", batch);
            book(timetable, "saturday", "8:00-9:00", "CS101", "Dr. Smith", "R-101")
        };
        let input = json!([saturday("A"), saturday("B")]);
        assert!(detect_conflicts(&input, &Weekday::WORKWEEK).valid);
        assert_eq!(detect_conflicts(&input, &Weekday::ALL).conflicts.len(), 2);
    }

    #[test]
    fn non_list_input_is_reported_as_data() {
        let result = detect_conflicts(&json!({"timetables": []}), &Weekday::WORKWEEK);
        assert!(!result.valid);
        assert_eq!(
            result.conflicts,
            vec!["Timetable data must be a list of timetables"]
        );
        assert_eq!(result.statistics, Statistics::default());
    }

    #[test]
    fn odd_shapes_are_skipped() {
        let input = json!([
            "not a timetable",
            {"monday": "busy"},
            {"monday": {"9:00-10:00": ["Dr. Smith"], "10:00-11:00": {"teacher": "Dr. Smith"}}},
            {"monday": {"10:00-11:00": {"teacher": "Dr. Smith", "room": ""}}},
        ]);
        let result = detect_conflicts(&input, &Weekday::WORKWEEK);
        assert_eq!(result.statistics.total_timetables, 4);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflict_details[0].first_timetable, 2);
        assert_eq!(result.conflict_details[0].timetable, 3);
        assert_eq!(result.statistics.unique_rooms_used, 0);
    }

    #[test]
    fn typed_scan_matches_untyped_scan() {
        let input = pair_with("Dr. Smith", "R-101", "Dr. Smith", "R-101");
        let schedules = validate(input.as_array().unwrap(), &[]);
        assert_eq!(schedules.len(), 2);
        let typed = detect_schedule_conflicts(&schedules, &Weekday::WORKWEEK);
        let untyped = detect_conflicts(&input, &Weekday::WORKWEEK);
        assert_eq!(typed, untyped);
        assert_eq!(typed.conflicts.len(), 2);
    }

    #[test]
    fn conflicts_follow_slot_order_within_a_day() {
        let first = monday_nine("A", "CS101", "Dr. Smith", "R-101");
        let first = book(first, "monday", "10:00-11:00", "MA101", "Prof. Jones", "R-201");
        let second = monday_nine("B", "CS102", "Dr. Smith", "R-102");
        let second = book(second, "monday", "10:00-11:00", "MA102", "Prof. Lee", "R-201");
        let input = json!([first, second]);

        let untyped = detect_conflicts(&input, &Weekday::WORKWEEK);
        assert_eq!(
            untyped.conflicts,
            vec![
                "Teacher conflict: Dr. Smith scheduled at monday 9:00-10:00 in multiple classes",
                "Room conflict: R-201 scheduled at monday 10:00-11:00 for multiple classes",
            ]
        );
        let schedules = validate(input.as_array().unwrap(), &[]);
        assert_eq!(detect_schedule_conflicts(&schedules, &Weekday::WORKWEEK), untyped);
    }

    #[test]
    fn provider_slot_order_is_kept() {
        let day = json!({
            "10:00-11:00": {"course": "MA101", "teacher": "Prof. Jones", "room": "R-201"},
            "9:00-10:00": {"course": "CS101", "teacher": "Dr. Smith", "room": "R-101"}
        });
        let input = json!([{"monday": day}, {"monday": day}]);
        let result = detect_conflicts(&input, &Weekday::WORKWEEK);
        let order: Vec<(&str, ConflictKind)> = result
            .conflict_details
            .iter()
            .map(|c| (c.time_slot.as_str(), c.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                ("10:00-11:00", ConflictKind::Teacher),
                ("10:00-11:00", ConflictKind::Room),
                ("9:00-10:00", ConflictKind::Teacher),
                ("9:00-10:00", ConflictKind::Room),
            ]
        );
    }

    #[test]
    fn same_timetable_twice_conflicts_with_itself() {
        let timetable = monday_nine("A", "CS101", "Dr. Smith", "R-101");
        let input = json!([timetable, timetable]);
        let result = detect_conflicts(&input, &Weekday::WORKWEEK);
        assert!(!result.valid);
        assert_eq!(result.conflict_details.len(), 2);
        assert!(
            result
                .conflict_details
                .iter()
                .all(|c| c.first_timetable == 0 && c.timetable == 1)
        );
        assert_eq!(result.statistics.total_timetables, 2);
        assert_eq!(result.statistics.total_classes_scheduled, 1);

        let schedules = validate(input.as_array().unwrap(), &[]);
        assert_eq!(detect_schedule_conflicts(&schedules, &Weekday::WORKWEEK), result);
    }

    #[test]
    fn list_valued_names_claim_nothing() {
        let first = monday_nine("A", "CS101", "Dr. Smith", "R-101");
        let mut second = blank_timetable("BTech", "B");
        second["monday"]["9:00-10:00"] =
            json!({"course": "CS102", "teacher": ["Dr. Smith"], "room": {"name": "R-101"}});
        let input = json!([first, second]);

        let result = detect_conflicts(&input, &Weekday::WORKWEEK);
        assert!(result.valid);
        let schedules = validate(input.as_array().unwrap(), &[]);
        assert_eq!(schedules.len(), 2);
        assert_eq!(detect_schedule_conflicts(&schedules, &Weekday::WORKWEEK), result);
    }
}

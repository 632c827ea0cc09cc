//! Timetable builders shared by the unit tests.

use serde_json::{Map, Value, json};

use crate::data::{TIME_SLOTS, Weekday};

/// A complete timetable with every slot of every day left free.
pub fn blank_timetable(program: &str, batch: &str) -> Value {
    let mut timetable = Map::new();
    timetable.insert("program".into(), json!(program));
    timetable.insert("branch".into(), json!("Computer Science"));
    timetable.insert("semester".into(), json!("1"));
    timetable.insert("batch".into(), json!(batch));
    timetable.insert("type".into(), json!("full-time"));
    for day in Weekday::ALL {
        let slots: Map<String, Value> = TIME_SLOTS
            .iter()
            .map(|slot| {
                (
                    slot.to_string(),
                    json!({"course": "", "teacher": "", "room": ""}),
                )
            })
            .collect();
        timetable.insert(day.to_string(), Value::Object(slots));
    }
    Value::Object(timetable)
}

/// Books one cell of a timetable built by `blank_timetable`.
pub fn book(
    mut timetable: Value,
    day: &str,
    slot: &str,
    course: &str,
    teacher: &str,
    room: &str,
) -> Value {
    timetable[day][slot] = json!({"course": course, "teacher": teacher, "room": room});
    timetable
}

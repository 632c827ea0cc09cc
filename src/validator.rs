use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::data::{
    ASSIGNMENT_FIELDS, Assignment, ClassRequest, DaySchedule, IDENTIFYING_FIELDS, Schedule,
    TIME_SLOTS, Weekday,
};
use crate::error::{SchemaError, StructuralViolation};

/// How candidate timetables are screened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Days every timetable must contain.
    pub days: Vec<Weekday>,
    /// Fail the whole batch on the first malformed candidate instead of dropping it.
    pub strict: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            days: Weekday::ALL.to_vec(),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub index: usize,
    pub violation: StructuralViolation,
}

/// Accepted timetables in input order, plus what was dropped and why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    pub accepted: Vec<Schedule>,
    pub rejected: Vec<Rejection>,
}

/// Keeps only the candidates that carry the full timetable structure.
///
/// Malformed candidates are dropped; nothing is reported besides the shorter
/// output. `original_requests` is context only and is not matched against the
/// returned timetables.
pub fn validate(candidates: &[Value], original_requests: &[ClassRequest]) -> Vec<Schedule> {
    screen(candidates, original_requests, &Weekday::ALL).accepted
}

/// Screens candidates under `options`. In lenient mode this never fails.
pub fn validate_with(
    candidates: &[Value],
    original_requests: &[ClassRequest],
    options: &ValidationOptions,
) -> Result<Validated, SchemaError> {
    let validated = screen(candidates, original_requests, &options.days);
    if options.strict {
        if let Some(first) = validated.rejected.first() {
            return Err(SchemaError::Rejected {
                index: first.index,
                violation: first.violation.clone(),
            });
        }
    }
    Ok(validated)
}

fn screen(candidates: &[Value], original_requests: &[ClassRequest], days: &[Weekday]) -> Validated {
    let mut validated = Validated::default();
    for (index, candidate) in candidates.iter().enumerate() {
        match Schedule::from_value(candidate, days) {
            Ok(schedule) => {
                debug!(
                    "Timetable {} accepted: {} with {} booked cells",
                    index,
                    schedule.label(),
                    schedule.booked_cells()
                );
                validated.accepted.push(schedule);
            }
            Err(violation) => {
                warn!("Timetable {} dropped: {}", index, violation);
                validated.rejected.push(Rejection { index, violation });
            }
        }
    }
    info!(
        "Accepted {} of {} generated timetables for {} requested classes",
        validated.accepted.len(),
        candidates.len(),
        original_requests.len()
    );
    validated
}

impl Schedule {
    /// Reads a timetable out of untyped provider output, requiring every
    /// identifying field, every listed day, every slot, and every slot field.
    /// Only presence is checked; values are kept as received.
    pub fn from_value(value: &Value, days: &[Weekday]) -> Result<Self, StructuralViolation> {
        let object = value.as_object().ok_or(StructuralViolation::NotAnObject)?;

        if let Some(&field) = IDENTIFYING_FIELDS
            .iter()
            .find(|&&field| !object.contains_key(field))
        {
            return Err(StructuralViolation::MissingField(field));
        }
        for &day in days {
            check_day(object, day)?;
        }

        let week = Weekday::ALL
            .iter()
            .filter_map(|&day| {
                let cells = object.get(day.as_str())?.as_object()?;
                Some(read_day(day, cells))
            })
            .collect();
        Ok(Schedule::new(object.clone(), week))
    }
}

fn check_day(object: &Map<String, Value>, day: Weekday) -> Result<(), StructuralViolation> {
    let cells = object
        .get(day.as_str())
        .and_then(Value::as_object)
        .ok_or(StructuralViolation::MissingDay(day))?;
    for &slot in &TIME_SLOTS {
        let cell = cells
            .get(slot)
            .and_then(Value::as_object)
            .ok_or(StructuralViolation::MissingSlot(day, slot))?;
        if let Some(&field) = ASSIGNMENT_FIELDS
            .iter()
            .find(|&&field| !cell.contains_key(field))
        {
            return Err(StructuralViolation::MissingAssignmentField { day, slot, field });
        }
    }
    Ok(())
}

// Every object cell of the day, canonical or not, in the provider's order.
fn read_day(day: Weekday, cells: &Map<String, Value>) -> DaySchedule {
    let slots = cells
        .iter()
        .filter_map(|(slot, cell)| {
            let cell = cell.as_object()?;
            Some((slot.clone(), Assignment::new(cell.clone())))
        })
        .collect();
    DaySchedule { day, slots }
}

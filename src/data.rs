use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;

use crate::error::InputError;

/// The twelve hour-long periods every generated timetable is expected to cover.
pub const TIME_SLOTS: [&str; 12] = [
    "7:00-8:00",
    "8:00-9:00",
    "9:00-10:00",
    "10:00-11:00",
    "11:00-12:00",
    "12:00-13:00",
    "13:00-14:00",
    "14:00-15:00",
    "15:00-16:00",
    "16:00-17:00",
    "17:00-18:00",
    "18:00-19:00",
];

/// The identifying attributes a timetable must carry, in wire order.
pub const IDENTIFYING_FIELDS: [&str; 5] = ["program", "branch", "semester", "batch", "type"];

/// The sub-fields of a single slot.
pub const ASSIGNMENT_FIELDS: [&str; 3] = ["course", "teacher", "room"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Monday through saturday; the set a complete timetable must contain.
    pub const ALL: [Weekday; 6] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// Monday through friday; the default set scanned for double-bookings.
    pub const WORKWEEK: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a scalar JSON value as text. `null` reads as the empty string;
/// arrays and objects have no text form.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

/// Name a teacher or room value contributes to conflict keys. Values without
/// a text form, and empty names, claim nothing.
pub fn resource_name(value: &Value) -> Option<String> {
    scalar_text(value).filter(|name| !name.is_empty())
}

static NULL: Value = Value::Null;

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// One day/slot cell exactly as the provider returned it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    cell: Map<String, Value>,
}

impl Assignment {
    pub fn new(cell: Map<String, Value>) -> Self {
        Self { cell }
    }

    /// The raw value of `field`, `null` when the cell lacks it.
    pub fn field(&self, field: &str) -> &Value {
        self.cell.get(field).unwrap_or(&NULL)
    }

    pub fn teacher_name(&self) -> Option<String> {
        resource_name(self.field("teacher"))
    }

    pub fn room_name(&self) -> Option<String> {
        resource_name(self.field("room"))
    }

    pub fn is_free(&self) -> bool {
        ASSIGNMENT_FIELDS
            .iter()
            .all(|field| is_blank(self.field(field)))
    }
}

/// One day of a timetable, cells in the order the provider listed them.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    pub day: Weekday,
    pub slots: Vec<(String, Assignment)>,
}

impl DaySchedule {
    pub fn cells(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.slots.iter().map(|(slot, cell)| (slot.as_str(), cell))
    }

    pub fn cell(&self, slot: &str) -> Option<&Assignment> {
        self.cells().find(|(s, _)| *s == slot).map(|(_, cell)| cell)
    }
}

/// A structurally valid weekly timetable for one class.
///
/// Only constructed through schema validation; see `Schedule::from_value`.
/// The provider's object is kept as received and serialized back unchanged;
/// `week` is a read view of the day mappings it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub week: Vec<DaySchedule>,
    raw: Map<String, Value>,
}

impl Schedule {
    pub(crate) fn new(raw: Map<String, Value>, week: Vec<DaySchedule>) -> Self {
        Self { week, raw }
    }

    /// The raw value of a top-level field, `null` when absent.
    pub fn field(&self, field: &str) -> &Value {
        self.raw.get(field).unwrap_or(&NULL)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn day(&self, day: Weekday) -> Option<&DaySchedule> {
        self.week.iter().find(|d| d.day == day)
    }

    /// Number of cells that hold a class.
    pub fn booked_cells(&self) -> usize {
        self.week
            .iter()
            .flat_map(|d| d.cells())
            .filter(|(_, a)| !a.is_free())
            .count()
    }

    pub fn label(&self) -> String {
        let text = |field: &str| {
            let value = self.field(field);
            scalar_text(value).unwrap_or_else(|| value.to_string())
        };
        format!(
            "{} {} sem {} batch {}",
            text("program"),
            text("branch"),
            text("semester"),
            text("batch")
        )
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// An empty timetable in the provider's shape: placeholder identifying
/// fields and every slot of every day free.
pub fn timetable_template() -> Value {
    let mut timetable = Map::new();
    for (field, placeholder) in [
        ("program", "program_name"),
        ("branch", "branch_name"),
        ("semester", "semester_number"),
        ("batch", "batch_name"),
        ("type", "full-time"),
    ] {
        timetable.insert(field.to_string(), json!(placeholder));
    }
    for day in Weekday::ALL {
        let slots: Map<String, Value> = TIME_SLOTS
            .iter()
            .map(|slot| {
                (
                    slot.to_string(),
                    json!({"course": "", "teacher": "", "room": "", "conflicts": []}),
                )
            })
            .collect();
        timetable.insert(day.to_string(), Value::Object(slots));
    }
    Value::Object(timetable)
}

/// A class the caller asked to have scheduled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ClassRequest {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub program: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub semester: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub batch: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub credits: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Caller-supplied request metadata echoed back in the response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSettings {
    pub request_id: Option<String>,
    pub generated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The complete input for a generation run.
///
/// Courses, teachers, rooms and existing timetables are only forwarded to the
/// generation provider, so they stay untyped.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationRequest {
    pub class_requests: Vec<ClassRequest>,
    pub existing_timetables: Vec<Value>,
    pub courses: Vec<Value>,
    pub teachers: Vec<Value>,
    pub rooms: Vec<Value>,
    pub settings: RequestSettings,
}

fn has_text(value: &Value, field: &str) -> bool {
    value.get(field).and_then(resource_name).is_some()
}

impl ClassRequest {
    /// Batch, branch and semester are all present and non-empty.
    pub fn is_complete(&self) -> bool {
        [&self.batch, &self.branch, &self.semester]
            .iter()
            .all(|field| field.as_deref().is_some_and(|text| !text.is_empty()))
    }
}

impl GenerationRequest {
    /// Checks the caller's input before any provider call. Positions in the
    /// error are 1-based.
    pub fn check(&self) -> Result<(), InputError> {
        if self.class_requests.is_empty() {
            return Err(InputError::NoClassRequests);
        }
        if let Some(i) = self.class_requests.iter().position(|c| !c.is_complete()) {
            return Err(InputError::IncompleteClass(i + 1));
        }
        if let Some(i) = self
            .courses
            .iter()
            .position(|c| !has_text(c, "name") || !has_text(c, "code"))
        {
            return Err(InputError::IncompleteCourse(i + 1));
        }
        if let Some(i) = self.teachers.iter().position(|t| !has_text(t, "name")) {
            return Err(InputError::UnnamedTeacher(i + 1));
        }
        if let Some(i) = self.rooms.iter().position(|r| !has_text(r, "name")) {
            return Err(InputError::UnnamedRoom(i + 1));
        }
        Ok(())
    }
}

/// Input for generating the timetable of one class.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SingleGenerationRequest {
    #[serde(alias = "classData")]
    pub class_request: Option<ClassRequest>,
    pub existing_timetables: Vec<Value>,
    pub courses: Vec<Value>,
    pub teachers: Vec<Value>,
    pub rooms: Vec<Value>,
    pub settings: RequestSettings,
}

impl TryFrom<SingleGenerationRequest> for GenerationRequest {
    type Error = InputError;

    fn try_from(single: SingleGenerationRequest) -> Result<Self, Self::Error> {
        let class_request = single.class_request.ok_or(InputError::MissingClass)?;
        Ok(GenerationRequest {
            class_requests: vec![class_request],
            existing_timetables: single.existing_timetables,
            courses: single.courses,
            teachers: single.teachers,
            rooms: single.rooms,
            settings: single.settings,
        })
    }
}

/// Body of a validation-only call: timetables produced elsewhere.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateRequest {
    pub timetables: Value,
    pub class_requests: Vec<ClassRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Teacher,
    Room,
}

/// A teacher or room claimed by two timetables in the same day/slot cell.
/// Timetable indices are positions in the scanned input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub day: Weekday,
    pub time_slot: String,
    pub resource: String,
    pub first_timetable: usize,
    pub timetable: usize,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConflictKind::Teacher => write!(
                f,
                "Teacher conflict: {} scheduled at {} {} in multiple classes",
                self.resource, self.day, self.time_slot
            ),
            ConflictKind::Room => write!(
                f,
                "Room conflict: {} scheduled at {} {} for multiple classes",
                self.resource, self.day, self.time_slot
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_timetables: usize,
    pub unique_teachers_used: usize,
    pub unique_rooms_used: usize,
    pub total_classes_scheduled: usize,
}

/// Outcome of a conflict scan over a batch of timetables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub conflicts: Vec<String>,
    pub conflict_details: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub statistics: Statistics,
}

impl ValidationResult {
    /// A result describing input that could not be scanned at all.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            conflicts: vec![message.into()],
            conflict_details: Vec::new(),
            warnings: Vec::new(),
            statistics: Statistics::default(),
        }
    }
}

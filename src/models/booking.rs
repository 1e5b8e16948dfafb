use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::schema::StructuredOutput;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Standard,
    Deep,
    MoveInOut,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Standard => "standard",
            ServiceType::Deep => "deep",
            ServiceType::MoveInOut => "move_in_out",
        }
    }
}

/// Names of the fields on a [`BookingRecord`], in declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingField {
    ServiceType,
    Date,
    Time,
    DurationHours,
    Location,
}

impl BookingField {
    pub const ALL: [BookingField; 5] = [
        BookingField::ServiceType,
        BookingField::Date,
        BookingField::Time,
        BookingField::DurationHours,
        BookingField::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingField::ServiceType => "service_type",
            BookingField::Date => "date",
            BookingField::Time => "time",
            BookingField::DurationHours => "duration_hours",
            BookingField::Location => "location",
        }
    }
}

/// A partially filled cleaning booking. `None` means "not yet known".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingRecord {
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl BookingRecord {
    /// Field-wise last-write-wins: start empty, take every known field from `prior`,
    /// then every known field from `extracted`.
    pub fn merge(prior: Option<&BookingRecord>, extracted: &BookingRecord) -> BookingRecord {
        let mut merged = BookingRecord::default();
        if let Some(prior) = prior {
            merged.overlay(prior);
        }
        merged.overlay(extracted);
        merged
    }

    /// Copy every non-null field of `other` over `self`.
    pub fn overlay(&mut self, other: &BookingRecord) {
        if other.service_type.is_some() {
            self.service_type = other.service_type;
        }
        if other.date.is_some() {
            self.date = other.date.clone();
        }
        if other.time.is_some() {
            self.time = other.time.clone();
        }
        if other.duration_hours.is_some() {
            self.duration_hours = other.duration_hours;
        }
        if other.location.is_some() {
            self.location = other.location.clone();
        }
    }

    pub fn is_set(&self, field: BookingField) -> bool {
        self.display(field).is_some()
    }

    /// Textual value of a field, if known.
    pub fn display(&self, field: BookingField) -> Option<String> {
        match field {
            BookingField::ServiceType => self.service_type.map(|s| s.as_str().to_string()),
            BookingField::Date => self.date.clone(),
            BookingField::Time => self.time.clone(),
            BookingField::DurationHours => self.duration_hours.map(|h| h.to_string()),
            BookingField::Location => self.location.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        BookingField::ALL.iter().all(|f| !self.is_set(*f))
    }

    /// Known fields as `field: value` pairs in declaration order.
    pub fn summary(&self) -> String {
        BookingField::ALL
            .iter()
            .filter_map(|f| self.display(*f).map(|v| format!("{}: {v}", f.as_str())))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Blank strings from the model carry no information; treat them as unknown.
    fn drop_blank_strings(&mut self) {
        for slot in [&mut self.date, &mut self.time, &mut self.location] {
            *slot = slot
                .take()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
    }
}

impl StructuredOutput for BookingRecord {
    const NAME: &'static str = "CleaningBooking";

    fn json_schema() -> Value {
        json!({
            "title": Self::NAME,
            "description": "Extracted booking details from a voice transcript. All fields optional; only set when confidently extracted from the transcript.",
            "type": "object",
            "properties": {
                "service_type": {
                    "anyOf": [
                        { "enum": ["standard", "deep", "move_in_out"], "type": "string" },
                        { "type": "null" }
                    ],
                    "default": null,
                    "description": "Type of cleaning service. 'standard' for regular cleaning, 'deep' for thorough/deep clean, 'move_in_out' for moving cleaning."
                },
                "date": {
                    "anyOf": [{ "type": "string" }, { "type": "null" }],
                    "default": null,
                    "description": "Requested date in YYYY-MM-DD format. Resolve relative dates from today."
                },
                "time": {
                    "anyOf": [{ "type": "string" }, { "type": "null" }],
                    "default": null,
                    "description": "Requested start time in HH:MM 24-hour format. '2pm' = '14:00', 'morning' = '09:00'."
                },
                "duration_hours": {
                    "anyOf": [{ "type": "number" }, { "type": "null" }],
                    "default": null,
                    "description": "Duration of cleaning in hours as a decimal. '3 hours' = 3.0, 'half day' = 4.0."
                },
                "location": {
                    "anyOf": [{ "type": "string" }, { "type": "null" }],
                    "default": null,
                    "description": "Property address or area to be cleaned."
                }
            }
        })
    }

    fn validate(&mut self) -> Result<(), String> {
        self.drop_blank_strings();

        if let Some(date) = &self.date {
            let well_formed = date.len() == 10 && NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok();
            if !well_formed {
                return Err(format!("date must be in YYYY-MM-DD format, got {date:?}"));
            }
        }
        if let Some(time) = &self.time {
            let well_formed = time.len() == 5 && NaiveTime::parse_from_str(time, TIME_FORMAT).is_ok();
            if !well_formed {
                return Err(format!("time must be in HH:MM 24-hour format, got {time:?}"));
            }
        }
        if let Some(hours) = self.duration_hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(format!("duration_hours must be a positive number, got {hours}"));
            }
        }
        Ok(())
    }
}

/// Result of one extraction turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionOutcome {
    pub booking: BookingRecord,
    pub missing_fields: Vec<BookingField>,
    pub clarification_prompt: Option<String>,
}

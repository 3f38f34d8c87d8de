//! Reminders attached to an incidence (iCal `VALARM` component)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmAction {
    Display,
    Audio,
    Email,
    Procedure,
}

impl AlarmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmAction::Display => "DISPLAY",
            AlarmAction::Audio => "AUDIO",
            AlarmAction::Email => "EMAIL",
            AlarmAction::Procedure => "PROCEDURE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DISPLAY" => Some(AlarmAction::Display),
            "AUDIO" => Some(AlarmAction::Audio),
            "EMAIL" => Some(AlarmAction::Email),
            "PROCEDURE" => Some(AlarmAction::Procedure),
            _ => None,
        }
    }
}

/// When an alarm fires
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmTrigger {
    /// Offset from the start of the incidence (negative means before)
    BeforeOrAfterStart(#[serde(with = "crate::datetime::duration_seconds")] Duration),
    /// Offset from the end (or due date) of the incidence
    BeforeOrAfterEnd(#[serde(with = "crate::datetime::duration_seconds")] Duration),
    Absolute(DateTime<Utc>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub action: AlarmAction,
    pub trigger: AlarmTrigger,
    pub description: Option<String>,
    /// Number of additional repetitions, each `snooze` apart
    pub repeat: u32,
    #[serde(with = "crate::datetime::optional_duration_seconds")]
    pub snooze: Option<Duration>,
}

impl Alarm {
    /// A display alarm firing `before` ahead of the start of the incidence
    pub fn display_before_start(before: Duration, description: Option<String>) -> Self {
        Self {
            action: AlarmAction::Display,
            trigger: AlarmTrigger::BeforeOrAfterStart(-before),
            description,
            repeat: 0,
            snooze: None,
        }
    }
}

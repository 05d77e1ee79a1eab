//! Protocol cards
//!
//! A card is the single output of a measure evaluation. It is wrapped in a
//! [`ProtocolCardEffect`] addressed to one patient and serialised to JSON for
//! the host. Commands attached to recommendations are references only; the
//! engine never executes them.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Measure status carried by a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Due,
    Satisfied,
    NotApplicable,
    /// Reserved; never produced by the engine
    Pending,
    /// Reserved; never produced by the engine
    NotRelevant,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Due => "due",
            CardStatus::Satisfied => "satisfied",
            CardStatus::NotApplicable => "not_applicable",
            CardStatus::Pending => "pending",
            CardStatus::NotRelevant => "not_relevant",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of action a recommendation can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    LabOrder,
    ImagingOrder,
    Refer,
    Instruct,
}

/// Reference to a host command, with the context needed to pre-populate it
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRef {
    pub command: CommandKind,
    pub context: Map<String, Value>,
}

impl CommandRef {
    pub fn new(command: CommandKind) -> Self {
        Self {
            command,
            context: Map::new(),
        }
    }

    /// Add a context entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// A single actionable recommendation on a card
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub button: String,
    pub href: Option<String>,
    pub command: Option<CommandRef>,
    /// Position on the card
    pub key: usize,
}

impl Recommendation {
    pub fn new(title: impl Into<String>, button: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            button: button.into(),
            href: None,
            command: None,
            key: 0,
        }
    }

    pub fn with_command(mut self, command: CommandRef) -> Self {
        self.command = Some(command);
        self
    }
}

// Wire shape: `command` is `{"type": ...}` and the command context sits beside it.
impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct CommandType {
            #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
            kind: Option<CommandKind>,
        }

        let empty = Map::new();
        let mut state = serializer.serialize_struct("Recommendation", 6)?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("button", &self.button)?;
        state.serialize_field("href", &self.href)?;
        state.serialize_field(
            "command",
            &CommandType {
                kind: self.command.as_ref().map(|c| c.command),
            },
        )?;
        state.serialize_field(
            "context",
            self.command.as_ref().map_or(&empty, |c| &c.context),
        )?;
        state.serialize_field("key", &self.key)?;
        state.end()
    }
}

/// The evaluated status of one measure for one patient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub title: String,
    pub narrative: String,
    pub recommendations: Vec<Recommendation>,
    pub status: CardStatus,
    pub feedback_enabled: bool,
    /// Days until the measure lapses, or -1 when not applicable
    pub due_in: i64,
    pub can_be_snoozed: bool,
}

impl Card {
    pub fn new(title: impl Into<String>, status: CardStatus) -> Self {
        Self {
            title: title.into(),
            narrative: String::new(),
            recommendations: Vec::new(),
            status,
            feedback_enabled: false,
            due_in: -1,
            can_be_snoozed: false,
        }
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into();
        self
    }

    pub fn with_due_in(mut self, due_in: i64) -> Self {
        self.due_in = due_in;
        self
    }

    /// Append a recommendation, assigning its key from its position
    pub fn push_recommendation(&mut self, mut recommendation: Recommendation) {
        recommendation.key = self.recommendations.len();
        self.recommendations.push(recommendation);
    }
}

/// Outbound effect carrying a card for one patient and measure
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolCardEffect {
    pub patient: String,
    pub key: String,
    pub data: Card,
}

impl ProtocolCardEffect {
    pub fn new(patient: impl Into<String>, key: impl Into<String>, data: Card) -> Self {
        Self {
            patient: patient.into(),
            key: key.into(),
            data,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for ProtocolCardEffect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProtocolCardEffect", 4)?;
        state.serialize_field("patient", &self.patient)?;
        state.serialize_field("patient_filter", &Value::Null)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("data", &self.data)?;
        state.end()
    }
}

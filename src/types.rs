use parse_display::Display;
use serde::{Deserialize, Serialize};

use crate::{ActionHash, AgentPubKey, Alert, Timestamp};


/// An immutable revision of an entry as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord<T> {
    pub action_hash: ActionHash,
    pub author: AgentPubKey,
    pub timestamp: Timestamp,
    pub entry: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventTime {
    Unique {
        start_time: Timestamp,
        end_time: Timestamp,
    },
    Periodic {
        start_time: Timestamp,
        event_duration: i64,
        period_duration: i64,
        /// `None` repeats forever.
        #[serde(rename = "ocurrences", alias = "occurrences")]
        occurrences: Option<u32>,
    },
}

impl EventTime {
    pub fn start_time(&self) -> Timestamp {
        match self {
            EventTime::Unique { start_time, .. } | EventTime::Periodic { start_time, .. } => {
                *start_time
            }
        }
    }

    /// End of the event, or of its last occurrence.
    ///
    /// `None` for events that repeat forever, and for periodic events whose last occurrence
    /// ends beyond the range of [`Timestamp`].
    pub fn end_time(&self) -> Option<Timestamp> {
        match *self {
            EventTime::Unique { end_time, .. } => Some(end_time),
            EventTime::Periodic {
                start_time,
                event_duration,
                period_duration,
                occurrences,
            } => {
                let last = i64::from(occurrences?.max(1) - 1);
                last.checked_mul(period_duration)?
                    .checked_add(start_time)?
                    .checked_add(event_duration)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromProposal {
    pub proposal_hash: ActionHash,
    pub assembly_hash: Option<ActionHash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub hosts: Vec<AgentPubKey>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub time: EventTime,
    pub cost: Option<String>,
    pub call_to_action_hash: ActionHash,
    pub from_proposal: Option<FromProposal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub hosts: Vec<AgentPubKey>,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub time: Option<EventTime>,
    pub cost: Option<String>,
    pub call_to_action_hash: ActionHash,
}

/// The part of a call to action this crate reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToAction {
    pub expiration_time: Option<Timestamp>,
}

/// A promise to cover `amount` units of one need of a call to action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub call_to_action_hash: ActionHash,
    /// Need 0 of an event's call to action is attendance.
    pub need_index: u32,
    pub amount: u32,
    #[serde(default)]
    pub comment: String,
}

/// An agent committed to attend, with the commitment that says so.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    pub agent: AgentPubKey,
    pub commitment_hash: ActionHash,
}

/// What the proposal status depends on: whether an assembly exists and when the call to
/// action expires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregation {
    pub assembly: Option<ActionHash>,
    pub expiration_time: Option<Timestamp>,
}

impl Aggregation {
    pub fn new(call_to_action: &CallToAction, assemblies: &[ActionHash]) -> Self {
        Self {
            assembly: assemblies.first().cloned(),
            expiration_time: call_to_action.expiration_time,
        }
    }
    pub fn completed(&self) -> bool {
        self.assembly.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    UpcomingEvent,
    PastEvent,
    CancelledEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposalStatus {
    #[display("open_proposal")]
    OpenProposal,
    #[display("expired_proposal")]
    ExpiredProposal,
    #[display("cancelled_proposal")]
    CancelledProposal,
    #[display("fulfilled_proposal({assembly_hash})")]
    FulfilledProposal { assembly_hash: ActionHash },
    #[display("actual_event({event_hash})")]
    ActualEvent { event_hash: ActionHash },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWithStatus {
    pub original_action_hash: ActionHash,
    pub current_event: EntryRecord<Event>,
    pub status: EventStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalWithStatus {
    pub original_action_hash: ActionHash,
    pub current_proposal: EntryRecord<Proposal>,
    pub status: ProposalStatus,
    pub call_to_action: EntryRecord<CallToAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IndexedKind {
    Event,
    Proposal,
}

/// A hash tagged with the collection it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{kind}/{hash}")]
pub struct IndexedHash {
    pub kind: IndexedKind,
    pub hash: ActionHash,
}

impl IndexedHash {
    pub fn event(hash: ActionHash) -> Self {
        Self {
            kind: IndexedKind::Event,
            hash,
        }
    }
    pub fn proposal(hash: ActionHash) -> Self {
        Self {
            kind: IndexedKind::Proposal,
            hash,
        }
    }
}

/// What an alert points at: the kind of action and its hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub action_hash: ActionHash,
}

/// Payload of the alerts sent about events and proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatherAlert {
    EventAlert {
        event_hash: ActionHash,
        action: AlertAction,
    },
    ProposalAlert {
        proposal_hash: ActionHash,
        action: AlertAction,
    },
}

/// Alerts together with the current status of the events and proposals they refer to.
///
/// Entities whose status cannot be read are missing from `events` and `proposals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertsWithStatus {
    pub alerts: Vec<Alert<GatherAlert>>,
    pub events: Vec<EventWithStatus>,
    pub proposals: Vec<ProposalWithStatus>,
}

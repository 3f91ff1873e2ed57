use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};


/// Microseconds since the UNIX epoch.
pub type Timestamp = i64;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    FromStr,
    Serialize,
    Deserialize,
)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HashKind {
    Action,
    Entry,
    Agent,
    External,
}

/// A typed content address.
///
/// Two hashes of different kinds never compare equal, even if they share the same core.
/// Use [`HoloHash::retype`] to compare an agent key with an entry hash.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, FromStr, Serialize, Deserialize,
)]
#[display("{kind}:{core}")]
pub struct HoloHash {
    pub kind: HashKind,
    pub core: String,
}

pub type ActionHash = HoloHash;
pub type EntryHash = HoloHash;
pub type AgentPubKey = HoloHash;

impl HoloHash {
    pub fn new(kind: HashKind, core: impl Into<String>) -> Self {
        Self {
            kind,
            core: core.into(),
        }
    }
    pub fn action(core: impl Into<String>) -> Self {
        Self::new(HashKind::Action, core)
    }
    pub fn entry(core: impl Into<String>) -> Self {
        Self::new(HashKind::Entry, core)
    }
    pub fn agent(core: impl Into<String>) -> Self {
        Self::new(HashKind::Agent, core)
    }

    /// Same core, different kind.
    pub fn retype(&self, kind: HashKind) -> Self {
        Self::new(kind, self.core.clone())
    }

    /// The form used to match link bases: agent keys are addressed as entries.
    pub fn normalized(&self) -> Self {
        match self.kind {
            HashKind::Agent => self.retype(HashKind::Entry),
            _ => self.clone(),
        }
    }
}

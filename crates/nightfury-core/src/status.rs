use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::TransitionError;

/// Progress of a single game for a client, and the aggregate progress of the
/// client itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Ready,
    InProgress,
    Failed,
    Completed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Ready,
        Status::InProgress,
        Status::Failed,
        Status::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::InProgress => "InProgress",
            Self::Failed => "Failed",
            Self::Completed => "Completed",
        }
    }

    /// Legacy numeric encoding (Ready = 0 .. Completed = 3).
    pub fn from_index(index: u64) -> Option<Self> {
        match index {
            0 => Some(Self::Ready),
            1 => Some(Self::InProgress),
            2 => Some(Self::Failed),
            3 => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ready" => Ok(Self::Ready),
            "InProgress" => Ok(Self::InProgress),
            "Failed" => Ok(Self::Failed),
            "Completed" => Ok(Self::Completed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Name(String),
    Index(u64),
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StatusRepr::deserialize(deserializer)? {
            StatusRepr::Name(name) => name.parse().map_err(serde::de::Error::custom),
            StatusRepr::Index(index) => Status::from_index(index).ok_or_else(|| {
                serde::de::Error::custom(format!("status index out of range: {index}"))
            }),
        }
    }
}

/// Progress marker for one game attached to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    pub name: String,
    pub status: Status,
}

impl GameStatus {
    pub fn ready(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Ready,
        }
    }

    pub fn in_progress(&self) -> Result<Self, TransitionError> {
        match self.status {
            Status::Ready | Status::InProgress => Ok(self.with(Status::InProgress)),
            from => Err(TransitionError::IllegalGameTransition {
                verb: "progress",
                from,
            }),
        }
    }

    pub fn completed(&self) -> Result<Self, TransitionError> {
        match self.status {
            Status::InProgress => Ok(self.with(Status::Completed)),
            from => Err(TransitionError::IllegalGameTransition {
                verb: "complete",
                from,
            }),
        }
    }

    pub fn failed(&self) -> Result<Self, TransitionError> {
        match self.status {
            Status::InProgress => Ok(self.with(Status::Failed)),
            from => Err(TransitionError::IllegalGameTransition {
                verb: "fail",
                from,
            }),
        }
    }

    fn with(&self, status: Status) -> Self {
        Self {
            name: self.name.clone(),
            status,
        }
    }
}

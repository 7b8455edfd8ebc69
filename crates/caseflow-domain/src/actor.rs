use serde::{Deserialize, Serialize};

use crate::identifiers::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Lawyer,
    Client,
}

/// Which party of a request an actor speaks for. Staff requests data from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorSide {
    Staff,
    Client,
}

impl ActorRole {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Lawyer => "LAWYER",
            Self::Client => "CLIENT",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "LAWYER" => Some(Self::Lawyer),
            "CLIENT" => Some(Self::Client),
            _ => None,
        }
    }

    pub const fn side(self) -> ActorSide {
        match self {
            Self::Admin | Self::Lawyer => ActorSide::Staff,
            Self::Client => ActorSide::Client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

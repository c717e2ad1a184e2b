//! Who is acting on a document
use serde::{Deserialize, Serialize};

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    #[n(0)]
    Employee,
    #[n(1)]
    Client,
}

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
)]
pub struct Actor {
    #[n(0)]
    #[serde(rename = "type")]
    pub kind: ActorKind,
    #[n(1)]
    pub id: u64,
}

impl Actor {
    pub fn employee(id: u64) -> Self {
        Self {
            kind: ActorKind::Employee,
            id,
        }
    }
    pub fn client(id: u64) -> Self {
        Self {
            kind: ActorKind::Client,
            id,
        }
    }
    pub fn is_employee(&self) -> bool {
        self.kind == ActorKind::Employee
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Employee,
    Client,
}

/// The signed-in user, if any.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct CurrentUser {
    pub id: Option<u64>,
    #[serde(default)]
    pub role: UserRole,
}

impl CurrentUser {
    pub fn employee(id: u64) -> Self {
        Self {
            id: Some(id),
            role: UserRole::Employee,
        }
    }
}

/// The `selectedClient` reference held in a document payload.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct ClientRef {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Decide who is acting. `None` means nobody is authorised to mutate yet.
///
/// Employees win over the document's client, a client-role login falls through
/// to the selected client.
pub fn determine_actor(
    current_user: Option<&CurrentUser>,
    selected_client: Option<&ClientRef>,
) -> Option<Actor> {
    if let Some(CurrentUser {
        id: Some(id),
        role: UserRole::Employee,
    }) = current_user
    {
        return Some(Actor::employee(*id));
    }
    selected_client.map(|client| Actor::client(client.id))
}

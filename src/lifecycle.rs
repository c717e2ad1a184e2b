//! Document status flags and the transitions they permit.
//!
//! The flags are stored independently, the server being the source of truth
//! for them. `REJECTED` and `FINALIZED` are terminal.
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Status {
    #[n(0)]
    pub client_viewed: bool,
    #[n(1)]
    pub your_turn: bool,
    #[n(2)]
    pub finalized: bool,
    #[n(3)]
    pub rejected: bool,
}

/// The single state shown for a set of flags.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum DisplayState {
    Draft,
    ClientViewed,
    YourTurn,
    Finalized,
    Rejected,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Transition {
    Edit,
    ClientViewed,
    Save,
    Confirm,
    Reject,
    GenerateArtifact,
}

impl Status {
    pub fn display_state(&self) -> DisplayState {
        if self.rejected {
            DisplayState::Rejected
        } else if self.finalized {
            DisplayState::Finalized
        } else if self.your_turn {
            DisplayState::YourTurn
        } else if self.client_viewed {
            DisplayState::ClientViewed
        } else {
            DisplayState::Draft
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rejected || self.finalized
    }

    pub fn allows(&self, transition: Transition) -> bool {
        self.ensure_allows(transition).is_ok()
    }

    pub fn ensure_allows(&self, transition: Transition) -> Result<(), DocumentError> {
        let state = self.display_state();

        if self.rejected {
            return Err(DocumentError::ReadOnly(state));
        }
        if self.finalized {
            return match transition {
                Transition::ClientViewed | Transition::GenerateArtifact => Ok(()),
                Transition::Edit | Transition::Save => Err(DocumentError::ReadOnly(state)),
                Transition::Confirm | Transition::Reject => {
                    Err(DocumentError::TransitionNotAllowed { transition, state })
                }
            };
        }
        Ok(())
    }
}

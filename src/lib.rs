//! Revision and change tracking for quotation documents.
//!
//! A [`session::DocumentSession`] holds the server copy of an open document
//! next to a working copy, keeps a structural change log between the two and
//! routes saves and lifecycle actions through a [`gateway::DocumentGateway`].
//! [`storage::SledGateway`] is the bundled gateway.

pub mod actor;
pub mod codec;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod gateway;
pub mod label;
pub mod lifecycle;
pub mod path;
pub mod pricing;
pub mod revision;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod utils;

pub use actor::{Actor, ActorKind, CurrentUser};
pub use diff::ChangeLogItem;
pub use document::{Document, NewDocument};
pub use error::{DocumentError, GatewayError};
pub use path::Path;
pub use session::DocumentSession;
pub use storage::SledGateway;

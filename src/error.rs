use thiserror::Error;

use crate::core::id::EntityId;

/// Errors raised by local guards before any remote call is attempted.
///
/// Remote failures never show up here: every mutation falls back to the
/// local store instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0} must not be blank")]
    BlankField(&'static str),
    #[error("folder {0} is a system folder and cannot be renamed or deleted")]
    SystemFolder(EntityId),
}

pub type Result<T> = std::result::Result<T, Error>;

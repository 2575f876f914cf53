//! Draw lifecycle state machine.
//!
//! Every status change goes through [`transition`], which is the only place where
//! transition legality is decided:
//!
//! | From        | Event     | To          |
//! |-------------|-----------|-------------|
//! | `DRAFT`     | `lock`    | `DRAFT`     |
//! | `DRAFT`     | `unlock`  | `DRAFT`     |
//! | `DRAFT`     | `freeze`  | `FROZEN`    |
//! | `FROZEN`    | `draw`    | `DRAWN`     |
//! | `DRAWN`     | `draw`    | `DRAWN`     |
//! | `DRAWN`     | `publish` | `PUBLISHED` |
//! | `PUBLISHED` | `publish` | `PUBLISHED` |
//!
//! Anything else is rejected. Data preconditions (lock timestamp, source binding,
//! slug presence) are checked by the callers, since they depend on other tables.

use std::fmt;

use derive_more::Display;

use crate::draw::Status;

/// Lifecycle event requested by an operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum Event {
    #[display(fmt = "lock")]
    Lock,
    #[display(fmt = "unlock")]
    Unlock,
    #[display(fmt = "freeze")]
    Freeze,
    #[display(fmt = "draw")]
    Draw,
    #[display(fmt = "publish")]
    Publish,
}

/// Requested event is not allowed from the current status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: Status,
    pub event: Event,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unable to {} while draw status is {}",
            self.event,
            status_name(self.from)
        )
    }
}

impl std::error::Error for IllegalTransition {}

/// Status name as exposed through the API.
pub fn status_name(status: Status) -> &'static str {
    match status {
        Status::Draft => "DRAFT",
        Status::Frozen => "FROZEN",
        Status::Drawn => "DRAWN",
        Status::Published => "PUBLISHED",
    }
}

/// Compute the status a draw ends up in after the provided event.
pub fn transition(from: Status, event: Event) -> Result<Status, IllegalTransition> {
    match (from, event) {
        (Status::Draft, Event::Lock | Event::Unlock) => Ok(Status::Draft),
        (Status::Draft, Event::Freeze) => Ok(Status::Frozen),
        (Status::Frozen | Status::Drawn, Event::Draw) => Ok(Status::Drawn),
        (Status::Drawn | Status::Published, Event::Publish) => Ok(Status::Published),
        (from, event) => Err(IllegalTransition { from, event }),
    }
}

/// All statuses from which the provided event is accepted.
///
/// Used to build conditional updates, so that two concurrent callers can't both
/// apply the same transition.
pub fn accepted_from(event: Event) -> Vec<Status> {
    [
        Status::Draft,
        Status::Frozen,
        Status::Drawn,
        Status::Published,
    ]
    .into_iter()
    .filter(|status| transition(*status, event).is_ok())
    .collect()
}

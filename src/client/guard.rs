//! Submission guard for saving sharing settings.
//!
//! # State Machine
//! ```text
//! Idle ──(not submitting ∧ changed)──▶ Submitting
//! Submitting ──(save finished, ok or err)──▶ Idle
//! ```
//!
//! A save attempted while `Submitting` is rejected, never queued.

use parking_lot::RwLock;

use crate::error::{SharingError, SharingResult};

pub const INVARIANT_DOING_SUBMIT_SHARING_CHANGES: &str =
    "cannot submit sharing changes while submitting changes";
pub const INVARIANT_SHARING_SETTINGS_NOT_CHANGED: &str =
    "cannot submit changes if sharing settings have not changed";

/// Submission state of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
}

/// Check the preconditions of a guarded save.
pub fn validate_can_submit(state: SubmitState, changed: bool) -> SharingResult<()> {
    if state == SubmitState::Submitting {
        return Err(SharingError::Precondition(INVARIANT_DOING_SUBMIT_SHARING_CHANGES));
    }
    if !changed {
        return Err(SharingError::Precondition(INVARIANT_SHARING_SETTINGS_NOT_CHANGED));
    }
    Ok(())
}

/// Non-failing form of [`validate_can_submit`].
pub fn can_submit(state: SubmitState, changed: bool) -> bool {
    validate_can_submit(state, changed).is_ok()
}

/// Access to the submit state stored inside a larger lock-protected struct.
pub trait HasSubmitState {
    fn submit_state_mut(&mut self) -> &mut SubmitState;
}

/// Marks a submission in flight; returns the state to `Idle` when dropped.
///
/// Dropping also covers a save future that is cancelled mid-flight.
pub struct SubmissionTicket<'a, S: HasSubmitState> {
    state: &'a RwLock<S>,
}

impl<'a, S: HasSubmitState> SubmissionTicket<'a, S> {
    /// Switch `guarded` to `Submitting` and hand out the ticket.
    ///
    /// `guarded` must be the write guard of `state` the preconditions were
    /// checked under, so check-and-set is atomic. Release it before the
    /// ticket is dropped.
    pub fn begin(state: &'a RwLock<S>, guarded: &mut S) -> Self {
        *guarded.submit_state_mut() = SubmitState::Submitting;
        Self { state }
    }
}

impl<S: HasSubmitState> Drop for SubmissionTicket<'_, S> {
    fn drop(&mut self) {
        *self.state.write().submit_state_mut() = SubmitState::Idle;
    }
}

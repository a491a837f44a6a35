//! Session driving.
//!
//! - [`SessionDriver`]: submits a trajectory sample by sample, retrying and
//!   aborting per the failure policy
//! - [`Submitter`]: the network collaborator contract
//! - [`LoopbackSubmitter`]: in-process collaborator for dry runs

mod driver;
mod submitter;

pub use driver::{
    SessionDriver, SessionDriverBuilder, SessionOutcome, SessionResult, run_session,
};
pub use submitter::{LoopbackSubmitter, SubmitError, SubmitResponse, SubmitStatus, Submitter};

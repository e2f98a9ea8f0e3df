//! Contracts with the auth backend: the serialized queue, the session store, and the
//! polling wait that turns a queued submission into its final outcome.

pub mod queue;
pub mod session;
pub mod wait;

pub use queue::{AuthQueue, LoginOutcome, PollToken, QueueResult, QueueStatus, Rejection};
pub use session::{Session, SessionResolver};
pub use wait::{wait_for_result, DEFAULT_POLL_INTERVAL};

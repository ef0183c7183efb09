//! Long-running goals with feedback, preemption and a final result
//!
//! An action is a service extended with a lossy feedback slot, a status
//! byte and a cancel timestamp. Cancellation is cooperative and
//! timestamp-based: the client stamps `cancel_ts`, the server polls
//! `is_preempt_requested` (true exactly when the cancel landed after the
//! current goal started) and voluntarily transitions to `Preempted`. A
//! cancel that arrives before the server accepts a goal is a no-op for that
//! goal.

pub mod channel;
pub mod client;
pub mod server;
pub mod status;

pub use channel::ActionLayout;
pub use client::ActionClient;
pub use server::ActionServer;
pub use status::ActionStatus;

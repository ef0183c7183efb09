//! Synchronous request/response services over a two-slot channel
//!
//! A service segment holds one request slot and one response slot, each with
//! its own process-shared mutex, condition variable and timestamp. The
//! server owns a dispatch thread that handles one request at a time;
//! clients block in short timed waits until their response timestamp
//! advances. Work is serialized but calls from concurrent clients are
//! unordered; per-client correlation must be layered on top.

pub mod channel;
pub mod client;
pub mod server;

pub use channel::ServiceLayout;
pub use client::ServiceClient;
pub use server::ServiceServer;

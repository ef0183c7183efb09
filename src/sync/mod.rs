//! Cross-process synchronization primitives
//!
//! Everything here operates on memory inside a shared segment: the mutexes
//! and condition variables are initialized with process-shared attributes
//! and live at offsets computed by the layout code, never on the heap.

pub mod clock;
pub mod pshared;

pub use clock::{monotonic_now_us, realtime_deadline_after_us};
pub use pshared::SharedCondPair;

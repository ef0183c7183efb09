//! C Foreign Function Interface for scripted and C++ consumers
//!
//! A flat, opaque-handle mirror of the segment, ring and topic operations.
//! The bridge adds no semantics: payload sizes are passed explicitly
//! because the surface is not generic, and every handle is destroyed with
//! an explicit call. Destroying a segment while ring views over it are
//! still alive invalidates those views.

pub mod ring;
pub mod segment;
pub mod topics;
pub mod types;
pub mod utils;

pub use types::{
    ShmBusErrorCode, ShmPublisherHandle, ShmRingHandle, ShmSegmentHandle, ShmSubscriberHandle,
};

pub use utils::HANDLE_REGISTRY;

pub use segment::{
    shmbus_segment_destroy, shmbus_segment_disconnect, shmbus_segment_disconnect_and_unlink,
    shmbus_segment_exists, shmbus_segment_is_disconnected, shmbus_segment_open,
    shmbus_segment_size, shmbus_unlink,
};

pub use ring::{
    shmbus_ring_attach_reader, shmbus_ring_claim, shmbus_ring_destroy, shmbus_ring_element_size,
    shmbus_ring_init_writer, shmbus_ring_newest, shmbus_ring_oldest, shmbus_ring_publish,
    shmbus_ring_read_slot, shmbus_ring_set_expiry, shmbus_ring_size_for, shmbus_ring_slot_count,
    shmbus_ring_wait_initialized, shmbus_ring_wait_update, shmbus_ring_write_slot,
};

pub use topics::{
    shmbus_publisher_create, shmbus_publisher_destroy, shmbus_publisher_publish,
    shmbus_subscriber_create, shmbus_subscriber_destroy, shmbus_subscriber_set_expiry,
    shmbus_subscriber_subscribe, shmbus_subscriber_wait,
};

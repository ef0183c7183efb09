//! Untyped byte-level topic endpoints
//!
//! The raw endpoints treat slot payloads as opaque byte strings; the typed
//! and vector endpoints, and the C bridge, are thin views over them.

use crate::{
    error::{Result, ShmError},
    ring::RingBuffer,
    segment::{Permission, Segment, SegmentConfig},
    sync::monotonic_now_us,
};

/// How long an attaching subscriber waits for the writer's init handshake
const ATTACH_INIT_TIMEOUT_US: u64 = 10_000;

/// Byte-level publisher: owns the segment plus a writer view of its ring.
///
/// The first connector initializes the ring; later connectors attach to the
/// existing header. Single-publisher-per-topic is the supported mode;
/// concurrent publishers are best-effort (a contended claim retries a
/// bounded number of times).
#[derive(Debug)]
pub struct RawPublisher {
    segment: Segment,
    ring: RingBuffer,
    /// Last stamp issued by this publisher; published timestamps must form
    /// a strictly increasing sequence even when two publishes land in the
    /// same microsecond
    last_stamp_us: u64,
}

impl RawPublisher {
    /// Create or attach a publisher with an exact element size.
    ///
    /// An existing segment whose header disagrees on `element_size` or
    /// `slot_count` is a configuration error, not silent corruption.
    pub fn new(
        name: &str,
        element_size: usize,
        slot_count: usize,
        permission: Permission,
    ) -> Result<Self> {
        Self::connect(name, element_size, slot_count, permission, false)
    }

    /// Create or attach a publisher that adopts the geometry of an existing
    /// segment (used by the vector layer, whose element size is fluid).
    pub fn new_adopting(
        name: &str,
        element_size: usize,
        slot_count: usize,
        permission: Permission,
    ) -> Result<Self> {
        Self::connect(name, element_size, slot_count, permission, true)
    }

    fn connect(
        name: &str,
        element_size: usize,
        slot_count: usize,
        permission: Permission,
        adopt_existing: bool,
    ) -> Result<Self> {
        if slot_count == 0 {
            return Err(ShmError::config("slot_count", "must be at least 1"));
        }
        let size = RingBuffer::size_for(element_size, slot_count);
        let segment = Segment::open(name, SegmentConfig::writer(permission), size)?;
        let base = unsafe { segment.as_base_ptr() }
            .ok_or_else(|| ShmError::not_connected("segment lost during publisher setup"))?;

        let ring = unsafe {
            if RingBuffer::is_initialized(base) {
                if adopt_existing {
                    RingBuffer::attach_reader(base, segment.size())?
                } else {
                    RingBuffer::attach_writer(base, segment.size(), element_size, slot_count)?
                }
            } else {
                RingBuffer::init_writer(base, segment.size(), element_size, slot_count)?
            }
        };

        Ok(Self {
            segment,
            ring,
            last_stamp_us: 0,
        })
    }

    fn next_stamp(&mut self) -> u64 {
        let stamp = monotonic_now_us().max(self.last_stamp_us + 1);
        self.last_stamp_us = stamp;
        stamp
    }

    /// Publish one payload: claim the oldest slot, copy, stamp, wake.
    ///
    /// `payload.len()` must equal the ring's element size.
    pub fn publish(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() != self.ring.element_size() {
            return Err(ShmError::config(
                "payload",
                format!(
                    "payload is {} bytes, topic element is {}",
                    payload.len(),
                    self.ring.element_size()
                ),
            ));
        }
        let index = self.ring.claim_oldest()?;
        self.ring.write_slot(index, payload);
        let stamp = self.next_stamp();
        self.ring.publish_slot(index, stamp);
        Ok(())
    }

    /// Destructive resize: unlink the segment and re-create it with a new
    /// element size.
    ///
    /// This is the only path that unlinks an in-use segment. Attached
    /// subscribers observe the unlink through their link-count probe and
    /// re-attach to the replacement on their next call.
    pub fn recreate(&mut self, element_size: usize) -> Result<()> {
        let slot_count = self.ring.slot_count();
        self.segment.disconnect_and_unlink()?;
        let size = RingBuffer::size_for(element_size, slot_count);
        self.segment.connect(size)?;
        let base = unsafe { self.segment.as_base_ptr() }
            .ok_or_else(|| ShmError::not_connected("segment lost during re-creation"))?;
        self.ring =
            unsafe { RingBuffer::init_writer(base, self.segment.size(), element_size, slot_count)? };
        Ok(())
    }

    /// Bytes per slot payload
    pub fn element_size(&self) -> usize {
        self.ring.element_size()
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.ring.slot_count()
    }

    /// The owned segment handle
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Unlink the topic's segment on the way out (opt-in; normal drop keeps
    /// the segment alive for restarts)
    pub fn disconnect_and_unlink(&mut self) -> Result<()> {
        self.segment.disconnect_and_unlink()
    }
}

/// Byte-level subscriber: connects lazily, re-attaches after the publisher
/// re-creates the segment.
#[derive(Debug)]
pub struct RawSubscriber {
    segment: Segment,
    ring: Option<RingBuffer>,
    expiry_us: u64,
}

impl RawSubscriber {
    /// Build a subscriber handle. The segment is not touched until the first
    /// subscribe, wait or probe.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            segment: Segment::new(name, SegmentConfig::reader())?,
            ring: None,
            expiry_us: crate::ring::DEFAULT_EXPIRY_US,
        })
    }

    fn ensure_attached(&mut self) -> Result<()> {
        if self.ring.is_some() && !self.segment.is_disconnected() {
            return Ok(());
        }
        self.ring = None;
        self.segment.connect(0)?;
        let base = unsafe { self.segment.as_base_ptr() }
            .ok_or_else(|| ShmError::not_connected("segment lost during attach"))?;

        if !unsafe { RingBuffer::wait_for_initialized(base, ATTACH_INIT_TIMEOUT_US) } {
            self.segment.disconnect();
            return Err(ShmError::init_timeout(
                self.segment.logical_name().to_string(),
                ATTACH_INIT_TIMEOUT_US,
            ));
        }

        let mut ring = unsafe { RingBuffer::attach_reader(base, self.segment.size())? };
        ring.set_expiry_us(self.expiry_us);
        self.ring = Some(ring);
        Ok(())
    }

    /// Element size recorded in the segment header, attaching first if
    /// needed
    pub fn element_size(&mut self) -> Result<usize> {
        self.ensure_attached()?;
        Ok(self.ring.as_ref().map(|r| r.element_size()).unwrap_or(0))
    }

    /// Copy the newest valid payload into `out`.
    ///
    /// Returns `false` and leaves `out` untouched when there is no valid
    /// unexpired data, when the publisher is gone, or when `out` does not
    /// match the topic's element size.
    pub fn subscribe_into(&mut self, out: &mut [u8]) -> bool {
        if self.ensure_attached().is_err() {
            return false;
        }
        let ring = match self.ring.as_mut() {
            Some(ring) => ring,
            None => return false,
        };
        if out.len() != ring.element_size() {
            return false;
        }
        match ring.newest_slot() {
            Some(index) => {
                ring.read_slot(index, out);
                true
            }
            None => false,
        }
    }

    /// Block until the topic is updated or `timeout_us` elapses
    pub fn wait_for_update(&mut self, timeout_us: u64) -> bool {
        if self.ensure_attached().is_err() {
            return false;
        }
        match self.ring.as_mut() {
            Some(ring) => ring.wait_for_update(timeout_us),
            None => false,
        }
    }

    /// Configure the staleness cutoff (0 disables)
    pub fn set_expiry_us(&mut self, expiry_us: u64) {
        self.expiry_us = expiry_us;
        if let Some(ring) = self.ring.as_mut() {
            ring.set_expiry_us(expiry_us);
        }
    }

    /// True while no live segment is attached
    pub fn is_disconnected(&self) -> bool {
        self.segment.is_disconnected()
    }

    /// Logical topic name
    pub fn logical_name(&self) -> &str {
        self.segment.logical_name()
    }
}

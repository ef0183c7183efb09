//! FFI utilities and handle management

use std::{
    collections::HashMap,
    ffi::{c_char, CStr},
    sync::{Arc, Mutex},
};

use crate::{
    ring::RingBuffer,
    segment::Segment,
    topic::{RawPublisher, RawSubscriber},
};

// Global handle management
lazy_static::lazy_static! {
    pub static ref HANDLE_REGISTRY: Mutex<HandleRegistry> = Mutex::new(HandleRegistry::new());
}

/// One ring view plus the segment whose mapping it borrows; the segment is
/// kept alive for as long as the ring handle exists.
pub struct RingEntry {
    pub ring: Mutex<RingBuffer>,
    pub segment: Arc<Mutex<Segment>>,
}

pub struct HandleRegistry {
    pub segments: HashMap<usize, Arc<Mutex<Segment>>>,
    pub rings: HashMap<usize, Arc<RingEntry>>,
    pub publishers: HashMap<usize, Arc<Mutex<RawPublisher>>>,
    pub subscribers: HashMap<usize, Arc<Mutex<RawSubscriber>>>,
    pub next_id: usize,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            segments: HashMap::new(),
            rings: HashMap::new(),
            publishers: HashMap::new(),
            subscribers: HashMap::new(),
            next_id: 1,
        }
    }

    fn next(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn store_segment(&mut self, segment: Segment) -> usize {
        let id = self.next();
        self.segments.insert(id, Arc::new(Mutex::new(segment)));
        id
    }

    pub fn get_segment(&self, id: usize) -> Option<Arc<Mutex<Segment>>> {
        self.segments.get(&id).cloned()
    }

    pub fn remove_segment(&mut self, id: usize) -> Option<Arc<Mutex<Segment>>> {
        self.segments.remove(&id)
    }

    pub fn store_ring(&mut self, ring: RingBuffer, segment: Arc<Mutex<Segment>>) -> usize {
        let id = self.next();
        self.rings.insert(
            id,
            Arc::new(RingEntry {
                ring: Mutex::new(ring),
                segment,
            }),
        );
        id
    }

    pub fn get_ring(&self, id: usize) -> Option<Arc<RingEntry>> {
        self.rings.get(&id).cloned()
    }

    pub fn remove_ring(&mut self, id: usize) -> bool {
        self.rings.remove(&id).is_some()
    }

    pub fn store_publisher(&mut self, publisher: RawPublisher) -> usize {
        let id = self.next();
        self.publishers.insert(id, Arc::new(Mutex::new(publisher)));
        id
    }

    pub fn get_publisher(&self, id: usize) -> Option<Arc<Mutex<RawPublisher>>> {
        self.publishers.get(&id).cloned()
    }

    pub fn remove_publisher(&mut self, id: usize) -> bool {
        self.publishers.remove(&id).is_some()
    }

    pub fn store_subscriber(&mut self, subscriber: RawSubscriber) -> usize {
        let id = self.next();
        self.subscribers.insert(id, Arc::new(Mutex::new(subscriber)));
        id
    }

    pub fn get_subscriber(&self, id: usize) -> Option<Arc<Mutex<RawSubscriber>>> {
        self.subscribers.get(&id).cloned()
    }

    pub fn remove_subscriber(&mut self, id: usize) -> bool {
        self.subscribers.remove(&id).is_some()
    }
}

/// Convert a C string to a Rust `String`
pub fn c_str_to_string(c_str: *const c_char) -> Result<String, std::str::Utf8Error> {
    if c_str.is_null() {
        return Ok(String::new());
    }
    unsafe { CStr::from_ptr(c_str).to_str().map(|s| s.to_owned()) }
}

//! Service server with a single dispatch thread

use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use bytemuck::{Pod, Zeroable};

use crate::{
    error::{Result, ShmError},
    segment::{Permission, Segment, SegmentConfig},
    sync::monotonic_now_us,
};

use super::channel::{ServiceChannel, ServiceLayout};

/// State shared between the owning handle and the dispatch thread.
///
/// The segment is held here so the mapping outlives the channel's raw
/// pointers for as long as either side is alive.
struct ServerInner {
    _segment: Segment,
    channel: ServiceChannel,
    shutdown: AtomicBool,
}

unsafe impl Send for ServerInner {}
unsafe impl Sync for ServerInner {}

/// Serves requests of type `Req` with responses of type `Res` on a named
/// channel.
///
/// Construction creates the segment, initializes both condition-variable
/// pairs and spawns the dispatch thread, which sleeps on the request condvar
/// until a client stamps a newer request timestamp. Work is serialized on
/// that one thread; the latest observed request wins when clients race.
///
/// Dropping the server stops the dispatch thread cooperatively: a shutdown
/// flag is set, the request condvar is broadcast under its mutex and the
/// thread is joined. The segment itself stays in the host namespace.
pub struct ServiceServer<Req: Pod, Res: Pod> {
    inner: Arc<ServerInner>,
    thread: Option<JoinHandle<()>>,
    _payload: PhantomData<(Req, Res)>,
}

impl<Req: Pod, Res: Pod> ServiceServer<Req, Res> {
    /// Create the service and start dispatching to `handler`
    pub fn new<F>(name: &str, handler: F) -> Result<Self>
    where
        F: Fn(Req) -> Res + Send + 'static,
    {
        Self::with_permission(name, handler, Permission::default())
    }

    /// Create the service with explicit permission bits
    pub fn with_permission<F>(name: &str, handler: F, permission: Permission) -> Result<Self>
    where
        F: Fn(Req) -> Res + Send + 'static,
    {
        let req_size = std::mem::size_of::<Req>();
        let res_size = std::mem::size_of::<Res>();
        let layout = ServiceLayout::compute(req_size, res_size);

        let segment = Segment::open(name, SegmentConfig::writer(permission), layout.total)?;
        let base = unsafe { segment.as_base_ptr() }
            .ok_or_else(|| ShmError::not_connected("segment lost during service setup"))?;
        let channel = unsafe { ServiceChannel::attach(base, segment.size(), req_size, res_size)? };
        let initial_ts = channel.initialize()?;

        let inner = Arc::new(ServerInner {
            _segment: segment,
            channel,
            shutdown: AtomicBool::new(false),
        });

        let worker = Arc::clone(&inner);
        let thread = std::thread::Builder::new()
            .name("shmbus-service".to_string())
            .spawn(move || dispatch_loop::<Req, Res, F>(worker, handler, initial_ts))
            .map_err(|e| ShmError::platform(format!("failed to spawn dispatch thread: {}", e)))?;

        Ok(Self {
            inner,
            thread: Some(thread),
            _payload: PhantomData,
        })
    }

    /// Logical name of the service channel
    pub fn logical_name(&self) -> &str {
        self.inner._segment.logical_name()
    }
}

impl<Req: Pod, Res: Pod> Drop for ServiceServer<Req, Res> {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        // Broadcast under the mutex so the dispatch thread cannot check the
        // flag and then sleep through the wakeup.
        let pair = self.inner.channel.req_pair();
        pair.lock();
        pair.broadcast();
        pair.unlock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn dispatch_loop<Req: Pod, Res: Pod, F>(inner: Arc<ServerInner>, handler: F, initial_ts: u64)
where
    F: Fn(Req) -> Res + Send + 'static,
{
    let channel = &inner.channel;
    let mut last_seen_req_ts = initial_ts;

    loop {
        channel.req_pair().lock();
        while last_seen_req_ts >= channel.request_ts()
            && !inner.shutdown.load(Ordering::Acquire)
        {
            channel.req_pair().wait();
        }
        if inner.shutdown.load(Ordering::Acquire) {
            channel.req_pair().unlock();
            break;
        }
        let mut request = Req::zeroed();
        channel.read_request(bytemuck::bytes_of_mut(&mut request));
        last_seen_req_ts = channel.request_ts();
        channel.req_pair().unlock();

        let response = handler(request);

        channel.res_pair().lock();
        channel.write_response(bytemuck::bytes_of(&response));
        // Strictly advance the stamp so a waiter's edge detection cannot
        // miss a response produced within the same microsecond
        let stamp = monotonic_now_us().max(channel.response_ts() + 1);
        channel.set_response_ts(stamp);
        channel.res_pair().unlock();
        channel.res_pair().broadcast();
    }
}

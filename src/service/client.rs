//! Service client

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::{
    error::{Result, ShmError},
    segment::{Segment, SegmentConfig},
    sync::monotonic_now_us,
};

use super::channel::ServiceChannel;

/// Wait slice while polling for the response timestamp to advance
const CALL_WAIT_SLICE_US: u64 = 10_000;

/// Calls a [`super::ServiceServer`] on a named channel.
///
/// The segment is attached lazily on the first call and re-attached if the
/// server re-created it. One outstanding call per handle; the handle is not
/// `Sync`, so concurrent calls require one client per thread.
pub struct ServiceClient<Req: Pod, Res: Pod> {
    segment: Segment,
    channel: Option<ServiceChannel>,
    last_response_ts: u64,
    _payload: PhantomData<(Req, Res)>,
}

impl<Req: Pod, Res: Pod> ServiceClient<Req, Res> {
    /// Build a client handle; the channel is attached on the first call
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            segment: Segment::new(name, SegmentConfig::reader())?,
            channel: None,
            last_response_ts: monotonic_now_us(),
            _payload: PhantomData,
        })
    }

    fn ensure_attached(&mut self) -> Result<()> {
        if self.channel.is_some() && !self.segment.is_disconnected() {
            return Ok(());
        }
        self.channel = None;
        self.segment.connect(0)?;
        let base = unsafe { self.segment.as_base_ptr() }
            .ok_or_else(|| ShmError::not_connected("segment lost during attach"))?;
        let channel = unsafe {
            ServiceChannel::attach(
                base,
                self.segment.size(),
                std::mem::size_of::<Req>(),
                std::mem::size_of::<Res>(),
            )?
        };
        self.channel = Some(channel);
        Ok(())
    }

    /// True when the server's segment exists and can be attached
    pub fn is_server_available(&mut self) -> bool {
        self.ensure_attached().is_ok()
    }

    /// Send `request` and block until the response arrives or `timeout_us`
    /// elapses.
    ///
    /// The wait accumulates in 10 ms slices against the total deadline and
    /// terminates on the first response timestamp strictly newer than this
    /// client's baseline. A timeout surfaces as
    /// [`ShmError::CallTimeout`]; an absent server as
    /// [`ShmError::NotConnected`] or a segment error.
    pub fn call(&mut self, request: &Req, timeout_us: u64) -> Result<Res> {
        self.ensure_attached()?;
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| ShmError::not_connected("service channel not attached"))?;

        channel.req_pair().lock();
        channel.write_request(bytemuck::bytes_of(request));
        let stamp = monotonic_now_us().max(channel.request_ts() + 1);
        channel.set_request_ts(stamp);
        channel.req_pair().unlock();
        channel.req_pair().broadcast();

        let started_us = monotonic_now_us();
        while channel.response_ts() <= self.last_response_ts {
            if monotonic_now_us().saturating_sub(started_us) >= timeout_us {
                return Err(ShmError::call_timeout(timeout_us));
            }
            let remaining = timeout_us.saturating_sub(monotonic_now_us() - started_us);
            channel.res_pair().lock();
            channel.res_pair().wait_for_us(remaining.min(CALL_WAIT_SLICE_US));
            channel.res_pair().unlock();
        }

        channel.res_pair().lock();
        let mut response = Res::zeroed();
        channel.read_response(bytemuck::bytes_of_mut(&mut response));
        channel.res_pair().unlock();
        self.last_response_ts = channel.response_ts();
        Ok(response)
    }
}

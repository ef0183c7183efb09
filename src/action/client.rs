//! Action client

use std::{marker::PhantomData, thread, time::Duration};

use bytemuck::{Pod, Zeroable};

use crate::{
    error::{Result, ShmError},
    segment::{Segment, SegmentConfig},
    sync::{clock::realtime_deadline_after_us, monotonic_now_us},
};

use super::{channel::ActionChannel, status::ActionStatus};

/// Poll period while waiting for the server's segment to appear
const SERVER_POLL_PERIOD_US: u64 = 100_000;

/// Sends goals to an [`super::ActionServer`] and tracks their outcome.
///
/// The segment is attached lazily; every operation that needs the channel
/// first re-probes the attachment so a restarted server is picked up
/// transparently.
pub struct ActionClient<G: Pod, R: Pod, F: Pod> {
    segment: Segment,
    channel: Option<ActionChannel>,
    last_result_ts: u64,
    _payload: PhantomData<(G, R, F)>,
}

impl<G: Pod, R: Pod, F: Pod> ActionClient<G, R, F> {
    /// Build a client handle; the channel is attached on first use
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            segment: Segment::new(name, SegmentConfig::reader())?,
            channel: None,
            last_result_ts: monotonic_now_us(),
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
            ActionChannel::attach(
                base,
                self.segment.size(),
                std::mem::size_of::<G>(),
                std::mem::size_of::<R>(),
                std::mem::size_of::<F>(),
            )?
        };
        self.channel = Some(channel);
        Ok(())
    }

    /// True when the server's segment exists and can be attached
    pub fn is_server_connected(&mut self) -> bool {
        self.ensure_attached().is_ok()
    }

    /// Poll for the server's segment, sleeping 100 ms between probes
    pub fn wait_for_server(&mut self, timeout_us: u64) -> bool {
        if self.is_server_connected() {
            return true;
        }
        let mut waited_us: u64 = 0;
        while waited_us < timeout_us {
            thread::sleep(Duration::from_micros(SERVER_POLL_PERIOD_US.min(timeout_us)));
            waited_us += SERVER_POLL_PERIOD_US;
            if self.is_server_connected() {
                return true;
            }
        }
        false
    }

    /// Submit a goal: record the result-timestamp baseline, copy the goal
    /// payload, stamp the goal timestamp and wake the server. `false` when
    /// no server segment is attachable.
    pub fn send_goal(&mut self, goal: &G) -> bool {
        if self.ensure_attached().is_err() {
            return false;
        }
        let channel = match self.channel.as_ref() {
            Some(channel) => channel,
            None => return false,
        };
        self.last_result_ts = channel.result_ts();

        channel.goal_pair().lock();
        channel.write_goal(bytemuck::bytes_of(goal));
        let stamp = monotonic_now_us().max(channel.goal_ts() + 1);
        channel.set_goal_ts(stamp);
        channel.goal_pair().unlock();
        channel.goal_pair().broadcast();
        true
    }

    /// Block until the result timestamp advances past the baseline recorded
    /// by the last [`ActionClient::send_goal`], or `timeout_us` elapses
    pub fn wait_for_result(&mut self, timeout_us: u64) -> bool {
        if self.ensure_attached().is_err() {
            return false;
        }
        let channel = match self.channel.as_ref() {
            Some(channel) => channel,
            None => return false,
        };
        let deadline = realtime_deadline_after_us(timeout_us);
        while self.last_result_ts >= channel.result_ts() {
            channel.result_pair().lock();
            let woke = channel.result_pair().wait_until(&deadline);
            channel.result_pair().unlock();
            if !woke {
                return false;
            }
        }
        true
    }

    /// Copy out the current result payload.
    ///
    /// Unspecified while a goal is mid-flight or after a preempt; meaningful
    /// once the status reports `Succeeded`.
    pub fn result(&mut self) -> Option<R> {
        self.ensure_attached().ok()?;
        let channel = self.channel.as_ref()?;
        channel.result_pair().lock();
        let mut result = R::zeroed();
        channel.read_result(bytemuck::bytes_of_mut(&mut result));
        channel.result_pair().unlock();
        Some(result)
    }

    /// Copy out the latest feedback. Lossy: intermediate values may be
    /// missed and a concurrent overwrite may be observed mid-copy.
    pub fn feedback(&mut self) -> Option<F> {
        self.ensure_attached().ok()?;
        let channel = self.channel.as_ref()?;
        let mut feedback = F::zeroed();
        channel.read_feedback(bytemuck::bytes_of_mut(&mut feedback));
        Some(feedback)
    }

    /// Current goal status
    pub fn status(&mut self) -> Option<ActionStatus> {
        self.ensure_attached().ok()?;
        Some(self.channel.as_ref()?.status())
    }

    /// Request cancellation of the running goal by stamping the cancel
    /// timestamp. Returns immediately; the server honors the request
    /// cooperatively. A cancel issued before the server accepts a goal has
    /// no effect on that goal.
    pub fn cancel_goal(&mut self) {
        if self.ensure_attached().is_err() {
            return;
        }
        if let Some(channel) = self.channel.as_ref() {
            channel.set_cancel_ts(monotonic_now_us());
        }
    }
}

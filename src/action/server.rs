//! Action server

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::{
    error::{Result, ShmError},
    segment::{Permission, Segment, SegmentConfig},
    sync::monotonic_now_us,
};

use super::{
    channel::{ActionChannel, ActionLayout},
    status::ActionStatus,
};

/// Executes goals of type `G`, streaming `F` feedback and finishing with an
/// `R` result.
///
/// Unlike a service there is no dispatch thread: the owning code drives the
/// goal loop itself, typically
/// `wait_new_goal_available` → `accept_new_goal` → work (checking
/// `is_preempt_requested` between steps) → `publish_result` or
/// `set_preempted`.
pub struct ActionServer<G: Pod, R: Pod, F: Pod> {
    segment: Segment,
    channel: ActionChannel,
    /// Monotonic stamp of the moment the current goal was accepted; the
    /// reference point for the preempt rule
    start_ts_us: u64,
    last_seen_goal_ts: u64,
    _payload: PhantomData<(G, R, F)>,
}

impl<G: Pod, R: Pod, F: Pod> ActionServer<G, R, F> {
    /// Create the action segment with default permissions
    pub fn new(name: &str) -> Result<Self> {
        Self::with_permission(name, Permission::default())
    }

    /// Create the action segment with explicit permission bits
    pub fn with_permission(name: &str, permission: Permission) -> Result<Self> {
        let layout = ActionLayout::compute(
            std::mem::size_of::<G>(),
            std::mem::size_of::<R>(),
            std::mem::size_of::<F>(),
        );
        let segment = Segment::open(name, SegmentConfig::writer(permission), layout.total)?;
        let base = unsafe { segment.as_base_ptr() }
            .ok_or_else(|| ShmError::not_connected("segment lost during action setup"))?;
        let channel = unsafe {
            ActionChannel::attach(
                base,
                segment.size(),
                std::mem::size_of::<G>(),
                std::mem::size_of::<R>(),
                std::mem::size_of::<F>(),
            )?
        };
        let initial_ts = channel.initialize()?;

        Ok(Self {
            segment,
            channel,
            start_ts_us: initial_ts,
            last_seen_goal_ts: initial_ts,
            _payload: PhantomData,
        })
    }

    /// Block until a client stamps a goal newer than the last one seen.
    ///
    /// This is the server's idle loop and the one untimed wait in the
    /// public surface.
    pub fn wait_new_goal_available(&mut self) {
        self.channel.goal_pair().lock();
        while self.last_seen_goal_ts >= self.channel.goal_ts() {
            self.channel.goal_pair().wait();
        }
        self.channel.goal_pair().unlock();
    }

    /// True when a goal newer than the last accepted or rejected one is
    /// pending
    pub fn is_new_goal_available(&self) -> bool {
        self.channel.goal_ts() > self.last_seen_goal_ts
    }

    /// Take the pending goal: transition to `Active`, restart the preempt
    /// reference clock and return the payload
    pub fn accept_new_goal(&mut self) -> G {
        self.channel.set_status(ActionStatus::Active);
        self.start_ts_us = monotonic_now_us();
        self.last_seen_goal_ts = self.channel.goal_ts();

        self.channel.goal_pair().lock();
        let mut goal = G::zeroed();
        self.channel.read_goal(bytemuck::bytes_of_mut(&mut goal));
        self.channel.goal_pair().unlock();
        goal
    }

    /// Refuse the pending goal and wake clients waiting for a result
    pub fn reject_new_goal(&mut self) {
        self.channel.set_status(ActionStatus::Rejected);
        self.last_seen_goal_ts = self.channel.goal_ts();
        self.channel.result_pair().broadcast();
    }

    /// True when the client asked to cancel after the current goal started.
    ///
    /// A cancel stamped before `accept_new_goal` does not preempt the goal;
    /// cancellation only applies to a started goal.
    pub fn is_preempt_requested(&self) -> bool {
        self.start_ts_us < self.channel.cancel_ts()
    }

    /// Honor a preempt: transition to `Preempted`, stamp the result
    /// timestamp and wake waiting clients. The result payload is left as-is.
    pub fn set_preempted(&mut self) {
        self.channel.set_status(ActionStatus::Preempted);
        let stamp = monotonic_now_us().max(self.channel.result_ts() + 1);
        self.channel.set_result_ts(stamp);
        self.channel.result_pair().broadcast();
    }

    /// Overwrite the feedback slot. Lossy: no lock, no wakeup, latest
    /// write wins.
    pub fn publish_feedback(&self, feedback: &F) {
        self.channel.write_feedback(bytemuck::bytes_of(feedback));
    }

    /// Finish the goal: store the result, transition to `Succeeded`, stamp
    /// the result timestamp and wake waiting clients
    pub fn publish_result(&mut self, result: &R) {
        self.channel.result_pair().lock();
        self.channel.write_result(bytemuck::bytes_of(result));
        self.channel.result_pair().unlock();
        self.channel.set_status(ActionStatus::Succeeded);
        let stamp = monotonic_now_us().max(self.channel.result_ts() + 1);
        self.channel.set_result_ts(stamp);
        self.channel.result_pair().broadcast();
    }

    /// Current goal status as stored in the segment
    pub fn status(&self) -> ActionStatus {
        self.channel.status()
    }

    /// Logical name of the action channel
    pub fn logical_name(&self) -> &str {
        self.segment.logical_name()
    }
}

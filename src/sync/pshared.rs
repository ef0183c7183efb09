//! Process-shared mutex/condvar pairs placed inside mapped segments

use crate::error::{Result, ShmError};

use super::clock::realtime_deadline_after_us;

/// A `pthread_mutex_t`/`pthread_cond_t` pair living at fixed offsets inside
/// a shared mapping.
///
/// The pair is a borrowed view: it never allocates and never destroys the
/// primitives (segments outlive processes, so destruction would tear the
/// primitives out from under live peers). Exactly one process initializes;
/// everyone else attaches.
#[derive(Debug, Clone, Copy)]
pub struct SharedCondPair {
    mutex: *mut libc::pthread_mutex_t,
    cond: *mut libc::pthread_cond_t,
}

unsafe impl Send for SharedCondPair {}

impl SharedCondPair {
    /// Wrap existing primitives at `mutex`/`cond`.
    ///
    /// # Safety
    /// Both pointers must be correctly aligned, inside a live mapping, and
    /// point at primitives either already initialized by a peer or about to
    /// be initialized through [`SharedCondPair::initialize`].
    pub unsafe fn from_raw(
        mutex: *mut libc::pthread_mutex_t,
        cond: *mut libc::pthread_cond_t,
    ) -> Self {
        Self { mutex, cond }
    }

    /// Initialize both primitives with `PTHREAD_PROCESS_SHARED` attributes
    pub fn initialize(&self) -> Result<()> {
        unsafe {
            let mut cond_attr = std::mem::MaybeUninit::<libc::pthread_condattr_t>::uninit();
            if libc::pthread_condattr_init(cond_attr.as_mut_ptr()) != 0 {
                return Err(ShmError::platform("pthread_condattr_init failed"));
            }
            let mut cond_attr = cond_attr.assume_init();
            libc::pthread_condattr_setpshared(&mut cond_attr, libc::PTHREAD_PROCESS_SHARED);
            let rc = libc::pthread_cond_init(self.cond, &cond_attr);
            libc::pthread_condattr_destroy(&mut cond_attr);
            if rc != 0 {
                return Err(ShmError::platform("pthread_cond_init failed"));
            }

            let mut mutex_attr = std::mem::MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            if libc::pthread_mutexattr_init(mutex_attr.as_mut_ptr()) != 0 {
                return Err(ShmError::platform("pthread_mutexattr_init failed"));
            }
            let mut mutex_attr = mutex_attr.assume_init();
            libc::pthread_mutexattr_setpshared(&mut mutex_attr, libc::PTHREAD_PROCESS_SHARED);
            let rc = libc::pthread_mutex_init(self.mutex, &mutex_attr);
            libc::pthread_mutexattr_destroy(&mut mutex_attr);
            if rc != 0 {
                return Err(ShmError::platform("pthread_mutex_init failed"));
            }
        }
        Ok(())
    }

    pub fn lock(&self) {
        unsafe {
            libc::pthread_mutex_lock(self.mutex);
        }
    }

    pub fn unlock(&self) {
        unsafe {
            libc::pthread_mutex_unlock(self.mutex);
        }
    }

    /// Wake every waiter on the condition variable
    pub fn broadcast(&self) {
        unsafe {
            libc::pthread_cond_broadcast(self.cond);
        }
    }

    /// Untimed wait. The mutex must be held; it is held again on return.
    pub fn wait(&self) {
        unsafe {
            libc::pthread_cond_wait(self.cond, self.mutex);
        }
    }

    /// Timed wait against an absolute realtime deadline. Returns `false` on
    /// timeout. The mutex must be held; it is held again on return.
    pub fn wait_until(&self, deadline: &libc::timespec) -> bool {
        let rc = unsafe { libc::pthread_cond_timedwait(self.cond, self.mutex, deadline) };
        rc != libc::ETIMEDOUT
    }

    /// Timed wait for `timeout_us` from now. Returns `false` on timeout.
    pub fn wait_for_us(&self, timeout_us: u64) -> bool {
        let deadline = realtime_deadline_after_us(timeout_us);
        self.wait_until(&deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    // In-process exercise; cross-process behavior is covered by the
    // integration suites through the topic and service layers.
    #[test]
    fn test_init_lock_broadcast() {
        let mut mutex = std::mem::MaybeUninit::<libc::pthread_mutex_t>::uninit();
        let mut cond = std::mem::MaybeUninit::<libc::pthread_cond_t>::uninit();
        let pair = unsafe { SharedCondPair::from_raw(mutex.as_mut_ptr(), cond.as_mut_ptr()) };
        pair.initialize().unwrap();

        pair.lock();
        pair.unlock();
        pair.broadcast();
    }

    #[test]
    fn test_timed_wait_times_out() {
        let mut mutex = std::mem::MaybeUninit::<libc::pthread_mutex_t>::uninit();
        let mut cond = std::mem::MaybeUninit::<libc::pthread_cond_t>::uninit();
        let pair = unsafe { SharedCondPair::from_raw(mutex.as_mut_ptr(), cond.as_mut_ptr()) };
        pair.initialize().unwrap();

        pair.lock();
        let woke = pair.wait_for_us(10_000);
        pair.unlock();
        assert!(!woke);
    }

    #[test]
    fn test_broadcast_wakes_waiter() {
        let mutex = Box::leak(Box::new(std::mem::MaybeUninit::<libc::pthread_mutex_t>::uninit()));
        let cond = Box::leak(Box::new(std::mem::MaybeUninit::<libc::pthread_cond_t>::uninit()));
        let pair = unsafe { SharedCondPair::from_raw(mutex.as_mut_ptr(), cond.as_mut_ptr()) };
        pair.initialize().unwrap();

        let woke = Arc::new(AtomicBool::new(false));
        let woke_clone = Arc::clone(&woke);
        let waiter = std::thread::spawn(move || {
            pair.lock();
            if pair.wait_for_us(2_000_000) {
                woke_clone.store(true, Ordering::SeqCst);
            }
            pair.unlock();
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        pair.lock();
        pair.broadcast();
        pair.unlock();

        waiter.join().unwrap();
        assert!(woke.load(Ordering::SeqCst));
    }
}

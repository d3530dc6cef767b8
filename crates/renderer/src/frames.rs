//! Bounds how far the CPU may run ahead of the GPU.
//!
//! There is one slot per in-flight frame; frame `n` uses slot
//! `n % count`. A slot is held from [`InFlightFrames::begin_frame`] until the
//! GPU reports the frame's work done via [`InFlightFrames::complete`], so the
//! CPU never rewrites per-frame data the GPU may still be reading. Frame `n`
//! only ever waits for frame `n - count`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use corelib::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};

pub struct InFlightFrames {
    /// Frame index currently holding each slot.
    slots: Mutex<Vec<Option<u64>>>,
    released: Condvar,
}

impl InFlightFrames {
    pub fn new(count: usize) -> CoreResult<Arc<Self>> {
        if count == 0 {
            return Err(CoreError::configuration(
                "in-flight frame count must be at least 1",
            ));
        }
        Ok(Arc::new(Self {
            slots: Mutex::new(vec![None; count]),
            released: Condvar::new(),
        }))
    }

    pub fn count(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn slot_index(&self, frame_index: u64) -> usize {
        (frame_index % self.count() as u64) as usize
    }

    /// Number of slots not held by any frame.
    pub fn available(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_free(&self, slot: usize) -> bool {
        self.slots.lock().get(slot).is_some_and(Option::is_none)
    }

    /// Block until the slot for `frame_index` is free, then take it.
    pub fn begin_frame(self: &Arc<Self>, frame_index: u64) -> FrameToken {
        let mut slots = self.slots.lock();
        let slot = (frame_index % slots.len() as u64) as usize;
        while let Some(holder) = slots[slot] {
            log::trace!("frame {} waiting for frame {} (slot {})", frame_index, holder, slot);
            self.released.wait(&mut slots);
        }
        slots[slot] = Some(frame_index);
        self.token(frame_index)
    }

    /// Like [`begin_frame`](Self::begin_frame) but gives up after `timeout`.
    pub fn try_begin_frame_for(
        self: &Arc<Self>,
        frame_index: u64,
        timeout: Duration,
    ) -> Option<FrameToken> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock();
        let slot = (frame_index % slots.len() as u64) as usize;
        while slots[slot].is_some() {
            if self.released.wait_until(&mut slots, deadline).timed_out() && slots[slot].is_some()
            {
                return None;
            }
        }
        slots[slot] = Some(frame_index);
        Some(self.token(frame_index))
    }

    /// Completion signal for `frame_index`; frees its slot.
    pub fn complete(&self, frame_index: u64) {
        let mut slots = self.slots.lock();
        let slot = (frame_index % slots.len() as u64) as usize;
        if slots[slot] == Some(frame_index) {
            slots[slot] = None;
            self.released.notify_all();
        } else {
            log::warn!(
                "completion for frame {} but slot {} is held by {:?}",
                frame_index,
                slot,
                slots[slot]
            );
        }
    }

    /// Wait until every slot is free. Returns `false` on timeout.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock();
        while slots.iter().any(Option::is_some) {
            if self.released.wait_until(&mut slots, deadline).timed_out() {
                return slots.iter().all(Option::is_none);
            }
        }
        true
    }

    fn token(self: &Arc<Self>, frame_index: u64) -> FrameToken {
        FrameToken {
            frames: Arc::clone(self),
            frame_index,
            submitted: false,
        }
    }
}

/// A held slot. Dropping it without [`submit`](Self::submit) releases the
/// slot at once, so a frame that fails before reaching the GPU does not
/// stall later frames.
#[must_use]
pub struct FrameToken {
    frames: Arc<InFlightFrames>,
    frame_index: u64,
    submitted: bool,
}

impl FrameToken {
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn slot(&self) -> usize {
        self.frames.slot_index(self.frame_index)
    }

    /// Hand the slot to the GPU; it stays held until `complete(frame_index)`.
    pub fn submit(mut self) {
        self.submitted = true;
    }
}

impl Drop for FrameToken {
    fn drop(&mut self) {
        if !self.submitted {
            self.frames.complete(self.frame_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn zero_slots_is_rejected() {
        assert!(matches!(
            InFlightFrames::new(0),
            Err(CoreError::Configuration(_))
        ));
    }

    #[test]
    fn frames_map_onto_slots_round_robin() {
        let frames = InFlightFrames::new(3).unwrap();
        assert_eq!(frames.slot_index(0), 0);
        assert_eq!(frames.slot_index(4), 1);
        assert_eq!(frames.slot_index(8), 2);
        let token = frames.begin_frame(5);
        assert_eq!(token.slot(), 2);
        assert_eq!(frames.available(), 2);
    }

    #[test]
    fn frame_two_waits_for_frame_zero() {
        let frames = InFlightFrames::new(2).unwrap();
        frames.begin_frame(0).submit();
        frames.begin_frame(1).submit();

        assert!(frames.try_begin_frame_for(2, SHORT).is_none());
        frames.complete(1);
        assert!(frames.try_begin_frame_for(2, SHORT).is_none());
        frames.complete(0);
        assert!(frames.try_begin_frame_for(2, SHORT).is_some());
    }

    #[test]
    fn frame_two_never_waits_for_frame_one() {
        let frames = InFlightFrames::new(2).unwrap();
        frames.begin_frame(0).submit();
        frames.begin_frame(1).submit();
        frames.complete(0);

        let token = frames
            .try_begin_frame_for(2, Duration::ZERO)
            .expect("slot 0 is free while frame 1 is still in flight");
        assert_eq!(token.frame_index(), 2);
        assert!(!frames.is_slot_free(1));
    }

    #[test]
    fn blocked_frame_resumes_on_completion() {
        let frames = InFlightFrames::new(2).unwrap();
        frames.begin_frame(0).submit();
        frames.begin_frame(1).submit();

        let (tx, rx) = mpsc::channel();
        let worker = {
            let frames = Arc::clone(&frames);
            thread::spawn(move || {
                let token = frames.begin_frame(2);
                tx.send(token.slot()).unwrap();
                token.submit();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        frames.complete(0);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn dropped_token_releases_slot() {
        let frames = InFlightFrames::new(1).unwrap();
        {
            let _token = frames.begin_frame(0);
            assert_eq!(frames.available(), 0);
        }
        assert_eq!(frames.available(), 1);
        assert!(frames.try_begin_frame_for(1, Duration::ZERO).is_some());
    }

    #[test]
    fn stale_completion_is_ignored() {
        let frames = InFlightFrames::new(2).unwrap();
        frames.begin_frame(2).submit();
        frames.complete(0);
        assert!(!frames.is_slot_free(0));
    }

    #[test]
    fn wait_idle_drains_all_slots() {
        let frames = InFlightFrames::new(2).unwrap();
        frames.begin_frame(0).submit();
        assert!(!frames.wait_idle_timeout(SHORT));

        let signaller = {
            let frames = Arc::clone(&frames);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                frames.complete(0);
            })
        };
        assert!(frames.wait_idle_timeout(Duration::from_secs(5)));
        signaller.join().unwrap();
    }
}

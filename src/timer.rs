//! Region-scoped cooperative countdown timer service
//!
//! Every delayed action in a region — cast countdowns, effect pulses and
//! expiries, concentration sweeps — goes through one wheel, driven by the
//! embedding loop. Callbacks never run in parallel: the wheel hands back
//! one due entry at a time and the region dispatches it with exclusive
//! access to all state.
//!
//! Cancellation is cooperative and cancel-beats-fire: a handle cancelled
//! within the same logical tick as its due time never fires. Because a
//! queued callback can still observe state mutated earlier in the tick,
//! owners keep their own liveness flags and re-check them on entry.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::core::types::TimerHandle;

/// A due entry popped from the wheel, ready to dispatch.
pub struct DueTimer<C> {
    pub handle: TimerHandle,
    pub fire_at: u64,
    period: Option<u64>,
    callback: Box<dyn FnMut(&mut C)>,
}

impl<C> DueTimer<C> {
    pub fn fire(&mut self, ctx: &mut C) {
        (self.callback)(ctx);
    }

    pub fn is_repeating(&self) -> bool {
        self.period.is_some()
    }
}

struct Entry<C> {
    period: Option<u64>,
    callback: Box<dyn FnMut(&mut C)>,
}

/// One-shot and repeating delayed callbacks on a shared cooperative clock.
pub struct TimerWheel<C> {
    // fire order: (time, sequence) so same-tick entries fire in schedule order
    queue: BinaryHeap<Reverse<(u64, u64)>>,
    queued_handles: AHashMap<(u64, u64), TimerHandle>,
    live: AHashMap<TimerHandle, Entry<C>>,
    // the entry currently dispatched; a cancel arriving while it runs must
    // stick even though the entry is out of `live`
    in_flight: Option<TimerHandle>,
    in_flight_cancelled: bool,
    next_handle: u64,
    next_seq: u64,
}

impl<C> Default for TimerWheel<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TimerWheel<C> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            queued_handles: AHashMap::new(),
            live: AHashMap::new(),
            in_flight: None,
            in_flight_cancelled: false,
            next_handle: 1,
            next_seq: 0,
        }
    }

    /// Schedules a one-shot callback `delay_ms` after `now`.
    pub fn schedule(
        &mut self,
        now: u64,
        delay_ms: u64,
        callback: Box<dyn FnMut(&mut C)>,
    ) -> TimerHandle {
        self.insert(now + delay_ms, None, callback)
    }

    /// Schedules a repeating callback every `period_ms`, first firing one
    /// full period from `now`.
    pub fn schedule_repeating(
        &mut self,
        now: u64,
        period_ms: u64,
        callback: Box<dyn FnMut(&mut C)>,
    ) -> TimerHandle {
        debug_assert!(period_ms > 0);
        self.insert(now + period_ms, Some(period_ms), callback)
    }

    fn insert(
        &mut self,
        fire_at: u64,
        period: Option<u64>,
        callback: Box<dyn FnMut(&mut C)>,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle, Entry { period, callback });
        self.push_queued(fire_at, handle);
        handle
    }

    fn push_queued(&mut self, fire_at: u64, handle: TimerHandle) {
        let key = (fire_at, self.next_seq);
        self.next_seq += 1;
        self.queue.push(Reverse(key));
        self.queued_handles.insert(key, handle);
    }

    /// Cancels a pending timer. A cancelled entry never fires again, even
    /// when already due within the current tick or currently dispatching.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.live.remove(&handle);
        if self.in_flight == Some(handle) {
            self.in_flight_cancelled = true;
        }
    }

    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Pops the earliest entry due at or before `now`, skipping cancelled
    /// entries. The caller dispatches it, then hands it back through
    /// [`TimerWheel::reinsert`] if it repeats.
    pub fn pop_due(&mut self, now: u64) -> Option<DueTimer<C>> {
        while let Some(Reverse(key)) = self.queue.peek().copied() {
            if key.0 > now {
                return None;
            }
            self.queue.pop();
            let handle = match self.queued_handles.remove(&key) {
                Some(h) => h,
                None => continue,
            };
            // cancelled entries linger in the queue; drop them here
            let entry = match self.live.remove(&handle) {
                Some(e) => e,
                None => continue,
            };
            self.in_flight = Some(handle);
            self.in_flight_cancelled = false;
            return Some(DueTimer {
                handle,
                fire_at: key.0,
                period: entry.period,
                callback: entry.callback,
            });
        }
        None
    }

    /// Re-arms a repeating timer after dispatch, keeping its handle. No-op
    /// for one-shot entries or entries whose owner cancelled the handle
    /// from inside the callback.
    pub fn reinsert(&mut self, due: DueTimer<C>) {
        let cancelled = self.in_flight == Some(due.handle) && self.in_flight_cancelled;
        self.in_flight = None;
        self.in_flight_cancelled = false;
        let period = match due.period {
            Some(p) if !cancelled => p,
            _ => return,
        };
        self.live.insert(
            due.handle,
            Entry {
                period: Some(period),
                callback: due.callback,
            },
        );
        let fire_at = due.fire_at + period;
        self.push_queued(fire_at, due.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(wheel: &mut TimerWheel<Vec<u32>>, log: &mut Vec<u32>, now: u64) {
        while let Some(mut due) = wheel.pop_due(now) {
            due.fire(log);
            wheel.reinsert(due);
        }
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut wheel: TimerWheel<Vec<u32>> = TimerWheel::new();
        let mut log = Vec::new();
        wheel.schedule(0, 300, Box::new(|l: &mut Vec<u32>| l.push(1)));
        drive(&mut wheel, &mut log, 299);
        assert!(log.is_empty());
        drive(&mut wheel, &mut log, 300);
        assert_eq!(log, vec![1]);
        drive(&mut wheel, &mut log, 10_000);
        assert_eq!(log, vec![1]);
    }

    #[test]
    fn test_cancel_beats_fire_same_tick() {
        let mut wheel: TimerWheel<Vec<u32>> = TimerWheel::new();
        let mut log = Vec::new();
        let h = wheel.schedule(0, 100, Box::new(|l: &mut Vec<u32>| l.push(1)));
        // cancel lands in the same logical tick the entry becomes due
        wheel.cancel(h);
        drive(&mut wheel, &mut log, 100);
        assert!(log.is_empty());
        assert!(!wheel.is_live(h));
    }

    #[test]
    fn test_repeating_fires_each_period() {
        let mut wheel: TimerWheel<Vec<u32>> = TimerWheel::new();
        let mut log = Vec::new();
        wheel.schedule_repeating(0, 250, Box::new(|l: &mut Vec<u32>| l.push(7)));
        drive(&mut wheel, &mut log, 1000);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_same_tick_entries_fire_in_schedule_order() {
        let mut wheel: TimerWheel<Vec<u32>> = TimerWheel::new();
        let mut log = Vec::new();
        wheel.schedule(0, 100, Box::new(|l: &mut Vec<u32>| l.push(1)));
        wheel.schedule(0, 100, Box::new(|l: &mut Vec<u32>| l.push(2)));
        wheel.schedule(0, 50, Box::new(|l: &mut Vec<u32>| l.push(0)));
        drive(&mut wheel, &mut log, 100);
        assert_eq!(log, vec![0, 1, 2]);
    }

    #[test]
    fn test_cancel_repeating_from_outside() {
        let mut wheel: TimerWheel<Vec<u32>> = TimerWheel::new();
        let mut log = Vec::new();
        let h = wheel.schedule_repeating(0, 100, Box::new(|l: &mut Vec<u32>| l.push(1)));
        drive(&mut wheel, &mut log, 250);
        assert_eq!(log.len(), 2);
        wheel.cancel(h);
        drive(&mut wheel, &mut log, 1000);
        assert_eq!(log.len(), 2);
        assert_eq!(wheel.pending(), 0);
    }
}

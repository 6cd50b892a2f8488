//! Cycle-counter timing
//!
//! Two ways to measure a code region:
//!
//! - one-shot: `let t = start(); ...; let cycles = stop(t);`
//! - repeated: a [`MeasurementSession`] collecting `capacity` samples whose
//!   median is returned by [`MeasurementSession::finish`]
//!
//! On x86_64 the counter is `rdtsc` fenced by `cpuid`: serialize then read at
//! the start of an interval, read then serialize at the end, so no
//! instruction from the measured region is reordered across either edge.
//! Other targets fall back to a monotonic nanosecond clock.
//!
//! Counter values taken on different cores are not comparable: a mark and its
//! record must run on the same thread, pinned to one core.

use crate::error::{Error, Result};

#[cfg(target_arch = "x86_64")]
mod counter {
    use core::arch::x86_64::{__cpuid, _rdtsc};

    #[inline(always)]
    pub fn serialize() {
        // cpuid drains the pipeline before the next instruction issues
        #[allow(unused_unsafe)]
        unsafe {
            let _ = __cpuid(0);
        }
    }

    #[inline(always)]
    pub fn read() -> u64 {
        #[allow(unused_unsafe)]
        unsafe {
            _rdtsc()
        }
    }
}

#[cfg(not(target_arch = "x86_64"))]
mod counter {
    use std::sync::atomic::{fence, Ordering};
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    #[inline(always)]
    pub fn serialize() {
        fence(Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn read() -> u64 {
        EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// Serialized read of the cycle counter
#[inline(always)]
pub fn read_cycle_counter() -> u64 {
    counter::serialize();
    counter::read()
}

/// Start a one-shot measurement
#[inline(always)]
pub fn start() -> u64 {
    read_cycle_counter()
}

/// Cycles elapsed since `start`
#[inline(always)]
pub fn stop(start: u64) -> u64 {
    let end = counter::read();
    counter::serialize();
    end.wrapping_sub(start)
}

/// Source of interval edges for a [`MeasurementSession`]
pub trait CycleCounter {
    /// Counter value opening an interval
    fn start(&mut self) -> u64;
    /// Counter value closing an interval
    fn stop(&mut self) -> u64;
}

/// The hardware time-stamp counter
#[derive(Debug, Default, Clone, Copy)]
pub struct Tsc;

impl CycleCounter for Tsc {
    #[inline(always)]
    fn start(&mut self) -> u64 {
        read_cycle_counter()
    }

    #[inline(always)]
    fn stop(&mut self) -> u64 {
        let end = counter::read();
        counter::serialize();
        end
    }
}

/// Fixed-capacity set of interval samples
///
/// `mark` and `record` must alternate strictly. Dropping an unfinished
/// session discards its samples.
#[derive(Debug)]
pub struct MeasurementSession<C: CycleCounter = Tsc> {
    samples: Vec<u64>,
    capacity: usize,
    open: Option<u64>,
    counter: C,
}

impl MeasurementSession<Tsc> {
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_counter(capacity, Tsc)
    }
}

impl<C: CycleCounter> MeasurementSession<C> {
    pub fn with_counter(capacity: usize, counter: C) -> Result<Self> {
        let mut samples = Vec::new();
        samples.try_reserve_exact(capacity).map_err(|_| Error::Allocation {
            what: "measurement samples",
            len: capacity,
        })?;
        log::debug!("measurement session opened, capacity {capacity}");

        Ok(Self {
            samples,
            capacity,
            open: None,
            counter,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    /// Open an interval at the current counter value
    pub fn mark(&mut self) -> Result<()> {
        if self.open.is_some() {
            return Err(Error::IntervalAlreadyOpen);
        }
        if self.is_full() {
            return Err(Error::CapacityExceeded(self.capacity));
        }
        self.open = Some(self.counter.start());
        Ok(())
    }

    /// Close the open interval and store its length
    pub fn record(&mut self) -> Result<u64> {
        let end = self.counter.stop();
        let start = self.open.take().ok_or(Error::RecordWithoutMark)?;
        let elapsed = end.wrapping_sub(start);
        self.samples.push(elapsed);
        Ok(elapsed)
    }

    /// Mark, run `f`, record
    pub fn measure<T>(&mut self, f: impl FnOnce() -> T) -> Result<T> {
        self.mark()?;
        let out = f();
        self.record()?;
        Ok(out)
    }

    /// Median of the recorded samples, consuming the session
    ///
    /// Samples are sorted ascending and the one at index `len / 2` is
    /// returned, so with an even count the upper middle sample wins.
    pub fn finish(mut self) -> Result<u64> {
        if self.open.is_some() {
            return Err(Error::UnfinishedSession("an interval is still open"));
        }
        if self.samples.is_empty() {
            return Err(Error::UnfinishedSession("no samples recorded"));
        }
        if !self.is_full() {
            log::debug!("finishing session with {} of {} samples", self.len(), self.capacity);
        }

        let mut samples = std::mem::take(&mut self.samples);
        samples.sort_unstable();
        Ok(samples[samples.len() / 2])
    }
}

impl<C: CycleCounter> Drop for MeasurementSession<C> {
    fn drop(&mut self) {
        if !self.samples.is_empty() {
            log::debug!("measurement session dropped with {} unfinished samples", self.samples.len());
        }
    }
}

/// Holder for at most one open [`MeasurementSession`]
///
/// Mirrors the init / mark / record / finish protocol of a single
/// measurement stream, refusing to open a second session over the first.
#[derive(Debug, Default)]
pub struct Timer<C: CycleCounter = Tsc> {
    session: Option<MeasurementSession<C>>,
}

impl<C: CycleCounter> Timer<C> {
    pub fn new() -> Self {
        Self { session: None }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn init(&mut self, capacity: usize) -> Result<()>
    where
        C: Default,
    {
        self.init_with_counter(capacity, C::default())
    }

    pub fn init_with_counter(&mut self, capacity: usize, counter: C) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::SessionAlreadyOpen);
        }
        self.session = Some(MeasurementSession::with_counter(capacity, counter)?);
        Ok(())
    }

    pub fn mark(&mut self) -> Result<()> {
        self.session.as_mut().ok_or(Error::NoActiveSession)?.mark()
    }

    pub fn record(&mut self) -> Result<u64> {
        self.session.as_mut().ok_or(Error::NoActiveSession)?.record()
    }

    /// Median of the open session; the timer is empty afterwards
    pub fn finish(&mut self) -> Result<u64> {
        self.session.take().ok_or(Error::NoActiveSession)?.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays interval lengths: every start reads 0, stops read the script
    #[derive(Default)]
    struct Scripted {
        deltas: VecDeque<u64>,
    }

    impl Scripted {
        fn new(deltas: &[u64]) -> Self {
            Self { deltas: deltas.iter().copied().collect() }
        }
    }

    impl CycleCounter for Scripted {
        fn start(&mut self) -> u64 {
            1_000
        }
        fn stop(&mut self) -> u64 {
            1_000 + self.deltas.pop_front().unwrap()
        }
    }

    fn run_session(deltas: &[u64]) -> u64 {
        let mut session = MeasurementSession::with_counter(deltas.len(), Scripted::new(deltas)).unwrap();
        for _ in deltas {
            session.mark().unwrap();
            session.record().unwrap();
        }
        session.finish().unwrap()
    }

    #[test]
    fn median_of_even_count_is_upper_middle() {
        assert_eq!(run_session(&[10, 30, 20, 40]), 30);
    }

    #[test]
    fn median_of_single_sample() {
        assert_eq!(run_session(&[17]), 17);
    }

    #[test]
    fn median_ignores_outliers() {
        assert_eq!(run_session(&[100, 101, 99, 1_000_000, 100]), 100);
    }

    #[test]
    fn record_without_mark_fails() {
        let mut session = MeasurementSession::with_counter(2, Scripted::new(&[5])).unwrap();
        assert!(matches!(session.record(), Err(Error::RecordWithoutMark)));
    }

    #[test]
    fn mark_twice_fails() {
        let mut session = MeasurementSession::with_counter(2, Scripted::new(&[])).unwrap();
        session.mark().unwrap();
        assert!(matches!(session.mark(), Err(Error::IntervalAlreadyOpen)));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut session = MeasurementSession::with_counter(1, Scripted::new(&[1, 2])).unwrap();
        session.measure(|| ()).unwrap();
        assert!(matches!(session.mark(), Err(Error::CapacityExceeded(1))));
    }

    #[test]
    fn finish_with_open_interval_fails() {
        let mut session = MeasurementSession::with_counter(1, Scripted::new(&[])).unwrap();
        session.mark().unwrap();
        assert!(matches!(session.finish(), Err(Error::UnfinishedSession(_))));
    }

    #[test]
    fn timer_refuses_overlapping_sessions() {
        let mut timer: Timer<Scripted> = Timer::new();
        timer.init_with_counter(1, Scripted::new(&[3])).unwrap();
        assert!(matches!(timer.init(4), Err(Error::SessionAlreadyOpen)));

        timer.mark().unwrap();
        timer.record().unwrap();
        assert_eq!(timer.finish().unwrap(), 3);

        // slot is free again
        assert!(!timer.is_open());
        timer.init(1).unwrap();
    }

    #[test]
    fn timer_without_session_fails() {
        let mut timer: Timer = Timer::new();
        assert!(matches!(timer.mark(), Err(Error::NoActiveSession)));
        assert!(matches!(timer.finish(), Err(Error::NoActiveSession)));
    }

    #[test]
    fn hardware_counter_session() {
        let mut session = MeasurementSession::new(8).unwrap();
        for _ in 0..8 {
            session.measure(|| std::hint::black_box((0..64u64).sum::<u64>())).unwrap();
        }
        assert!(session.is_full());
        session.finish().unwrap();

        let t = start();
        let _ = stop(t);
    }
}

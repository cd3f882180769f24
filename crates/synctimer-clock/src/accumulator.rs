//! Wraparound-tolerant nanosecond accumulator.
//!
//! The accumulator keeps an *epoch*: the raw counter value at the last
//! re-basing point together with the nanoseconds accumulated up to it.
//! Reads convert the (masked, wrapping) cycle distance from the epoch and
//! add it to the epoch nanoseconds. [`WrappingAccumulator::update`] moves the
//! epoch forward so that the distance a reader has to convert stays below
//! one full counter wrap.
//!
//! # Caller obligation
//!
//! `update()` (or a read on the persistent clock) must run at least once per
//! counter wrap period. If a full wrap elapses unobserved, the next delta
//! aliases to a smaller value and the lost wraps are silently dropped: the
//! accumulator cannot tell "short interval" from "one extra wrap".
//!
//! # Concurrency
//!
//! The epoch is guarded by a sequence counter (odd = write in progress).
//! Readers never lock: they retry if an update overlapped their read.
//! Writers serialize on the sequence counter itself, so concurrent
//! `update()` callers are safe, though one periodic updater is the norm.

use crate::scale::Scale;
use crate::source::CounterSource;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, trace};

/// Snapshot of the accumulator's re-basing point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Epoch {
    /// Raw counter value at the re-basing point.
    pub cycles: u32,
    /// Nanoseconds accumulated up to the re-basing point.
    pub ns: u64,
    /// Sub-nanosecond remainder, in units of `2^-shift` ns.
    pub frac: u64,
}

/// Sequence-protected epoch storage.
#[derive(Debug)]
struct ClockData {
    /// Sequence number (odd = write in progress).
    sequence: CachePadded<AtomicU64>,
    epoch_cycles: AtomicU32,
    epoch_ns: AtomicU64,
    epoch_frac: AtomicU64,
}

impl ClockData {
    fn new() -> Self {
        Self {
            sequence: CachePadded::new(AtomicU64::new(0)),
            epoch_cycles: AtomicU32::new(0),
            epoch_ns: AtomicU64::new(0),
            epoch_frac: AtomicU64::new(0),
        }
    }

    /// Wait for any in-flight write and return the sequence to validate against.
    #[inline]
    fn begin_read(&self) -> u64 {
        loop {
            let seq = self.sequence.load(Ordering::Acquire);
            if seq & 1 == 0 {
                return seq;
            }
            std::hint::spin_loop();
        }
    }

    /// True if no write started since `seq` was taken.
    #[inline]
    fn validate(&self, seq: u64) -> bool {
        self.sequence.load(Ordering::Acquire) == seq
    }

    #[inline]
    fn load(&self) -> Epoch {
        Epoch {
            cycles: self.epoch_cycles.load(Ordering::Acquire),
            ns: self.epoch_ns.load(Ordering::Acquire),
            frac: self.epoch_frac.load(Ordering::Acquire),
        }
    }

    /// Consistent snapshot of the epoch.
    fn snapshot(&self) -> Epoch {
        loop {
            let seq = self.begin_read();
            let epoch = self.load();
            if self.validate(seq) {
                return epoch;
            }
            std::hint::spin_loop();
        }
    }

    /// Replace the epoch under the write side of the sequence counter.
    ///
    /// `f` receives the current epoch and returns the new one.
    fn write<F>(&self, f: F) -> Epoch
    where
        F: FnOnce(Epoch) -> Epoch,
    {
        // Claim the writer slot: move the sequence from even to odd.
        let mut seq = self.sequence.load(Ordering::Relaxed);
        loop {
            if seq & 1 != 0 {
                std::hint::spin_loop();
                seq = self.sequence.load(Ordering::Relaxed);
                continue;
            }
            match self.sequence.compare_exchange_weak(
                seq,
                seq + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => seq = current,
            }
        }

        let next = f(self.load());
        self.epoch_cycles.store(next.cycles, Ordering::Release);
        self.epoch_ns.store(next.ns, Ordering::Release);
        self.epoch_frac.store(next.frac, Ordering::Release);

        // Back to even: write complete.
        self.sequence.store(seq + 2, Ordering::Release);
        next
    }
}

/// Running nanosecond total derived from a wrapping counter.
#[derive(Debug)]
pub struct WrappingAccumulator<S> {
    source: S,
    scale: Scale,
    mask: u32,
    initialized: AtomicBool,
    data: ClockData,
}

impl<S: CounterSource> WrappingAccumulator<S> {
    /// Create an accumulator over `source`.
    ///
    /// `mask` selects the valid counter bits (`u32::MAX` for a 32-bit
    /// counter). Until [`init`](Self::init) runs every read returns `0`.
    pub fn new(source: S, scale: Scale, mask: u32) -> Self {
        Self {
            source,
            scale,
            mask,
            initialized: AtomicBool::new(false),
            data: ClockData::new(),
        }
    }

    /// Set the epoch to the current counter value and zero nanoseconds.
    ///
    /// Returns the counter value used. Calling it again restarts from zero.
    pub fn init(&self) -> u32 {
        let cycles = self.source.read();
        self.init_at(cycles);
        cycles
    }

    /// Set the epoch to `cycles` and zero nanoseconds.
    pub fn init_at(&self, cycles: u32) {
        self.data.write(|_| Epoch {
            cycles,
            ns: 0,
            frac: 0,
        });
        self.initialized.store(true, Ordering::Release);
        debug!(cycles, "Accumulator epoch initialized");
    }

    /// Whether [`init`](Self::init) has run.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Re-base the epoch on the current counter value.
    ///
    /// Returns the accumulated nanoseconds at the new epoch, or `0` before
    /// initialization (the call is then a no-op).
    pub fn update(&self) -> u64 {
        if !self.is_initialized() {
            return 0;
        }
        // Sample inside the write section so racing updaters stay ordered.
        let epoch = self
            .data
            .write(|epoch| self.advance(epoch, self.source.read()));
        trace!(cycles = epoch.cycles, ns = epoch.ns, "Accumulator epoch updated");
        epoch.ns
    }

    /// Re-base the epoch on an explicit counter value.
    ///
    /// `cycles` must not be older than the current epoch.
    pub fn update_at(&self, cycles: u32) -> u64 {
        if !self.is_initialized() {
            return 0;
        }
        let epoch = self.data.write(|epoch| self.advance(epoch, cycles));
        trace!(cycles, ns = epoch.ns, "Accumulator epoch updated");
        epoch.ns
    }

    /// Nanoseconds accumulated up to now, without moving the epoch.
    ///
    /// The counter is sampled inside the sequence-protected section, so an
    /// update racing with this read can never leave the sample behind the
    /// epoch it is measured from.
    #[inline]
    pub fn read_now(&self) -> u64 {
        if !self.is_initialized() {
            return 0;
        }
        loop {
            let seq = self.data.begin_read();
            let epoch = self.data.load();
            let cycles = self.source.read();
            if self.data.validate(seq) {
                return self.project(epoch, cycles);
            }
            std::hint::spin_loop();
        }
    }

    /// Nanoseconds the accumulator would report at raw counter value `cycles`.
    #[inline]
    pub fn read_at(&self, cycles: u32) -> u64 {
        if !self.is_initialized() {
            return 0;
        }
        self.project(self.data.snapshot(), cycles)
    }

    /// Current epoch snapshot.
    pub fn epoch(&self) -> Epoch {
        self.data.snapshot()
    }

    /// Conversion constants.
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Valid counter bits.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// The underlying counter source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cycles elapsed from `from` to `to`, modulo the counter width.
    #[inline]
    pub fn delta(&self, from: u32, to: u32) -> u32 {
        to.wrapping_sub(from) & self.mask
    }

    #[inline]
    fn project(&self, epoch: Epoch, cycles: u32) -> u64 {
        let (ns, _) = self
            .scale
            .cycles_to_ns_frac(self.delta(epoch.cycles, cycles), epoch.frac);
        epoch.ns.wrapping_add(ns)
    }

    fn advance(&self, epoch: Epoch, cycles: u32) -> Epoch {
        let (ns, frac) = self
            .scale
            .cycles_to_ns_frac(self.delta(epoch.cycles, cycles), epoch.frac);
        Epoch {
            cycles,
            ns: epoch.ns.wrapping_add(ns),
            frac,
        }
    }
}

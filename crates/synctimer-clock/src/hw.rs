//! Memory-mapped 32k sync-counter registers.
//!
//! Each supported SoC family exposes the counter as a 32-bit read-only
//! register. The family is selected once, at bring-up; after that the
//! clocks only see a [`CounterSource`].

use crate::source::{CounterSource, SharedCounter};
use std::sync::Arc;
use synctimer_common::config::SocVariant;

/// Absolute counter register on OMAP16xx.
pub const OMAP16XX_TIMER_32K_SYNCHRONIZED: usize = 0xfffb_c410;

/// 32k sync-timer module base on OMAP2420.
pub const OMAP2420_32KSYNCT_BASE: usize = 0x4800_4000;
/// 32k sync-timer module base on OMAP2430.
pub const OMAP2430_32KSYNCT_BASE: usize = 0x4902_0000;
/// 32k sync-timer module base on OMAP34xx.
pub const OMAP3430_32KSYNCT_BASE: usize = 0x4832_0000;
/// 32k sync-timer module base on OMAP44xx.
pub const OMAP4430_32KSYNCT_BASE: usize = 0x4a30_4000;

/// Counter register offset within the sync-timer module.
pub const COUNTER_32K_OFFSET: usize = 0x10;

/// Physical address of the counter register, or `None` for families
/// without a 32k sync counter.
#[must_use]
pub fn counter_register(variant: &SocVariant) -> Option<usize> {
    match variant {
        SocVariant::Omap16xx => Some(OMAP16XX_TIMER_32K_SYNCHRONIZED),
        SocVariant::Omap2420 => Some(OMAP2420_32KSYNCT_BASE + COUNTER_32K_OFFSET),
        SocVariant::Omap2430 => Some(OMAP2430_32KSYNCT_BASE + COUNTER_32K_OFFSET),
        SocVariant::Omap34xx => Some(OMAP3430_32KSYNCT_BASE + COUNTER_32K_OFFSET),
        SocVariant::Omap44xx => Some(OMAP4430_32KSYNCT_BASE + COUNTER_32K_OFFSET),
        SocVariant::Unsupported(_) => None,
    }
}

/// Volatile reader for a mapped 32-bit counter register.
#[derive(Debug)]
pub struct MmioCounter {
    register: *const u32,
}

// SAFETY: The register is read-only device memory; a 32-bit volatile load is
// atomic on every supported family, so concurrent readers need no coordination.
unsafe impl Send for MmioCounter {}
unsafe impl Sync for MmioCounter {}

impl MmioCounter {
    /// Wrap a mapped counter register.
    ///
    /// # Safety
    ///
    /// `register` must point to a mapped, 4-byte aligned, readable counter
    /// register that stays mapped for as long as the returned value lives.
    #[must_use]
    pub const unsafe fn new(register: *const u32) -> Self {
        Self { register }
    }

    /// Address being read.
    #[must_use]
    pub fn register(&self) -> *const u32 {
        self.register
    }
}

impl CounterSource for MmioCounter {
    #[inline]
    fn read(&self) -> u32 {
        // SAFETY: validity of the mapping is the constructor's contract.
        unsafe { std::ptr::read_volatile(self.register) }
    }
}

/// Translates a physical register address into a readable counter.
pub trait RegisterMap: Send + Sync {
    /// Map the counter register at physical address `phys`.
    fn map_counter(&self, phys: usize) -> Option<SharedCounter>;
}

/// Register map for environments where physical addresses are directly
/// addressable (MMU off or identity-mapped I/O).
#[derive(Debug)]
pub struct IdentityMap {
    _private: (),
}

impl IdentityMap {
    /// Create an identity map.
    ///
    /// # Safety
    ///
    /// Every address handed to [`RegisterMap::map_counter`] must be readable
    /// as-is for the rest of the program.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterMap for IdentityMap {
    fn map_counter(&self, phys: usize) -> Option<SharedCounter> {
        // SAFETY: guaranteed by `IdentityMap::new`'s contract.
        let counter = unsafe { MmioCounter::new(phys as *const u32) };
        Some(Arc::new(counter))
    }
}

impl<F> RegisterMap for F
where
    F: Fn(usize) -> Option<SharedCounter> + Send + Sync,
{
    fn map_counter(&self, phys: usize) -> Option<SharedCounter> {
        self(phys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_table() {
        assert_eq!(counter_register(&SocVariant::Omap16xx), Some(0xfffb_c410));
        assert_eq!(counter_register(&SocVariant::Omap2420), Some(0x4800_4010));
        assert_eq!(counter_register(&SocVariant::Omap2430), Some(0x4902_0010));
        assert_eq!(counter_register(&SocVariant::Omap34xx), Some(0x4832_0010));
        assert_eq!(counter_register(&SocVariant::Omap44xx), Some(0x4a30_4010));
        assert_eq!(
            counter_register(&SocVariant::Unsupported("omap1510".into())),
            None
        );
    }

    #[test]
    fn test_mmio_counter_reads_volatile() {
        let register: u32 = 0x0000_8000;
        // SAFETY: `register` outlives `counter` within this test.
        let counter = unsafe { MmioCounter::new(&register) };
        assert_eq!(counter.read(), 0x8000);
        assert_eq!(counter.register(), &register as *const u32);
    }
}

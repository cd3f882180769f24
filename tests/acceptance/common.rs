//! Common utilities for acceptance tests.
//!
//! Provides helpers for:
//! - Installing a test log subscriber
//! - Bringing up the clocks on a simulated counter

#![allow(dead_code)] // Not every helper is used by every test module

use anyhow::Result;
use std::sync::Arc;
use synctimer_clock::{init_counter_32k, Counter32k, SimulatedCounter, SimulatedPlatform, TimeRegistry};
use synctimer_common::config::ClockConfig;
use synctimer_common::time::Timespec;
use tracing_subscriber::EnvFilter;

/// Counter ticks per second at the default rate.
pub const TICKS_PER_SEC: u32 = 32_768;

/// Nanoseconds per counter tick, truncated.
pub const TICK_NS: u64 = 30_517;

/// Clocks brought up on a hand-driven counter.
pub struct TestClocks {
    /// The raw simulated register.
    pub counter: Arc<SimulatedCounter>,
    /// Registry holding the installed clocks.
    pub registry: TimeRegistry,
    /// Handle returned by bring-up.
    pub clocks: Counter32k,
}

/// Install a test-friendly log subscriber once. Honors `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Bring up the clocks with `config` on a counter starting at `start`.
pub fn bring_up_with(config: &ClockConfig, start: u32, boot_time: Timespec) -> Result<TestClocks> {
    init_logging();
    let counter = Arc::new(SimulatedCounter::new(start));
    let platform = SimulatedPlatform::new(counter.clone());
    let mut registry = TimeRegistry::new();
    let clocks = init_counter_32k(&platform, config, &mut registry, boot_time)?;
    Ok(TestClocks {
        counter,
        registry,
        clocks,
    })
}

/// Bring up the default 32 kHz clocks on a counter starting at `start`.
pub fn bring_up(start: u32, boot_time: Timespec) -> Result<TestClocks> {
    bring_up_with(&ClockConfig::default(), start, boot_time)
}

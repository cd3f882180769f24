//! Acceptance tests for the synctimer 32k counter clocks.
//!
//! These tests verify the clock guarantees end to end:
//! - Concurrent persistent-clock reads neither lose nor double-count ticks
//! - Counter wraparound is transparent to both clocks
//! - Scheduler clock readings never go backwards
//! - Long simulated runs stay exact with periodic re-basing
//!
//! Everything runs against a simulated counter; no hardware is needed.

mod acceptance;

//! Integration tests for synctimer acceptance testing.
//!
//! Each module exercises one guarantee of the clocks through the public
//! bring-up API, driving a `SimulatedCounter` by hand.

mod common;
mod concurrency_test;
mod monotonic_test;
mod soak_test;
mod wraparound_test;

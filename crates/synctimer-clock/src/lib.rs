#![doc = "Clocks derived from the always-on 32 kHz synchronization counter."]

pub mod accumulator;
pub mod clocksource;
pub mod hw;
pub mod monotonic;
pub mod persistent;
pub mod platform;
pub mod rebase;
pub mod scale;
pub mod source;

pub use accumulator::*;
pub use clocksource::*;
pub use hw::*;
pub use monotonic::*;
pub use persistent::*;
pub use platform::*;
pub use rebase::*;
pub use scale::*;
pub use source::*;

//! Platform bring-up for the 32k counter clocks.
//!
//! Bring-up connects two capabilities:
//!
//! - inbound, a [`CounterPlatform`] that selects the counter register for the
//!   running SoC and gates its interface clock on;
//! - outbound, a [`TimeSubsystem`] that accepts the clocksource and the two
//!   derived clocks as process-wide time sources.
//!
//! [`init_counter_32k`] runs the sequence once and returns a [`Counter32k`]
//! handle owning the clocks.

use crate::clocksource::{ClockSource, ClockSourceInfo};
use crate::hw::{counter_register, RegisterMap};
use crate::monotonic::{default_update_interval, MonotonicClock};
use crate::persistent::PersistentClock;
use crate::rebase::RebaseTimer;
use crate::scale::Scale;
use crate::source::SharedCounter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synctimer_common::config::{ClockConfig, SocVariant};
use synctimer_common::error::{ClockError, ClockResult};
use synctimer_common::time::Timespec;
use tracing::{debug, error, info, warn};

/// Scheduler clock as registered with the time subsystem.
pub type SchedClock = MonotonicClock<Arc<ClockSource>>;

/// Persistent clock as registered with the time subsystem.
pub type Persistent = PersistentClock<Arc<ClockSource>>;

/// Inbound platform capability: counter selection and clock gating.
pub trait CounterPlatform {
    /// Select and map the raw counter for the running platform.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::UnsupportedPlatform`] when the platform has no
    /// known counter source.
    fn counter_source(&self) -> ClockResult<SharedCounter>;

    /// Gate on the bus/interface clock feeding the counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock cannot be found or enabled. Bring-up
    /// treats this as non-fatal.
    fn enable_counter_clock(&self, name: &str) -> ClockResult<()>;
}

/// Outbound capability: the platform's global time subsystem.
pub trait TimeSubsystem {
    /// Register the counter as a clocksource at its frequency.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Registration`] if the subsystem refuses it.
    fn register_clocksource(&mut self, info: &ClockSourceInfo) -> ClockResult<()>;

    /// Install the process-wide scheduler clock.
    fn register_sched_clock(&mut self, clock: Arc<SchedClock>);

    /// Install the process-wide persistent clock.
    fn register_persistent_clock(&mut self, clock: Arc<Persistent>);
}

/// Interface-clock gate used by [`OmapPlatform`].
pub trait ClockGate: Send + Sync {
    /// Enable the named clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock is unknown or cannot be enabled.
    fn enable(&self, name: &str) -> ClockResult<()>;
}

impl<F> ClockGate for F
where
    F: Fn(&str) -> ClockResult<()> + Send + Sync,
{
    fn enable(&self, name: &str) -> ClockResult<()> {
        self(name)
    }
}

/// OMAP-family platform: picks the sync-counter register for a variant.
pub struct OmapPlatform<M, G> {
    variant: SocVariant,
    registers: M,
    gate: G,
}

impl<M: RegisterMap, G: ClockGate> OmapPlatform<M, G> {
    /// Create a platform for `variant`, mapping registers through `registers`.
    pub fn new(variant: SocVariant, registers: M, gate: G) -> Self {
        Self {
            variant,
            registers,
            gate,
        }
    }

    /// Create a platform for the variant named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::UnsupportedPlatform`] if no variant is configured.
    pub fn from_config(config: &ClockConfig, registers: M, gate: G) -> ClockResult<Self> {
        let variant = config
            .variant
            .clone()
            .ok_or_else(|| ClockError::UnsupportedPlatform {
                variant: "unknown".into(),
            })?;
        Ok(Self::new(variant, registers, gate))
    }

    /// The detected SoC family.
    pub fn variant(&self) -> &SocVariant {
        &self.variant
    }
}

impl<M: RegisterMap, G: ClockGate> CounterPlatform for OmapPlatform<M, G> {
    fn counter_source(&self) -> ClockResult<SharedCounter> {
        let unsupported = || ClockError::UnsupportedPlatform {
            variant: self.variant.to_string(),
        };
        let phys = counter_register(&self.variant).ok_or_else(unsupported)?;
        debug!(variant = %self.variant, phys = %format!("{phys:#x}"), "Mapping 32k counter");
        self.registers.map_counter(phys).ok_or_else(unsupported)
    }

    fn enable_counter_clock(&self, name: &str) -> ClockResult<()> {
        self.gate.enable(name)
    }
}

/// Software platform for testing without hardware.
pub struct SimulatedPlatform {
    counter: Option<SharedCounter>,
    gate_available: bool,
    gate_enables: AtomicUsize,
}

impl SimulatedPlatform {
    /// Platform backed by `counter` with a working interface clock.
    pub fn new(counter: SharedCounter) -> Self {
        Self {
            counter: Some(counter),
            gate_available: true,
            gate_enables: AtomicUsize::new(0),
        }
    }

    /// Platform without any counter source.
    pub fn unsupported() -> Self {
        Self {
            counter: None,
            gate_available: true,
            gate_enables: AtomicUsize::new(0),
        }
    }

    /// Make interface-clock enablement fail.
    #[must_use]
    pub fn without_gate(mut self) -> Self {
        self.gate_available = false;
        self
    }

    /// Number of successful interface-clock enables.
    pub fn gate_enables(&self) -> usize {
        self.gate_enables.load(Ordering::Relaxed)
    }
}

impl CounterPlatform for SimulatedPlatform {
    fn counter_source(&self) -> ClockResult<SharedCounter> {
        self.counter
            .clone()
            .ok_or_else(|| ClockError::UnsupportedPlatform {
                variant: "simulated".into(),
            })
    }

    fn enable_counter_clock(&self, name: &str) -> ClockResult<()> {
        if !self.gate_available {
            return Err(ClockError::Config(format!("no such clock: {name}")));
        }
        self.gate_enables.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// In-process time subsystem holding the registered sources.
#[derive(Default)]
pub struct TimeRegistry {
    clocksources: Vec<ClockSourceInfo>,
    sched_clock: Option<Arc<SchedClock>>,
    persistent_clock: Option<Arc<Persistent>>,
    refuse_clocksources: bool,
}

impl TimeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every clocksource registration.
    #[must_use]
    pub fn refusing_clocksources(mut self) -> Self {
        self.refuse_clocksources = true;
        self
    }

    /// Registered clocksources, in registration order.
    pub fn clocksources(&self) -> &[ClockSourceInfo] {
        &self.clocksources
    }

    /// Most recently registered clocksource.
    pub fn clocksource(&self) -> Option<&ClockSourceInfo> {
        self.clocksources.last()
    }

    /// Scheduler clock reading, or `0` if none is registered.
    pub fn sched_clock(&self) -> u64 {
        self.sched_clock.as_ref().map_or(0, |clock| clock.now_ns())
    }

    /// Persistent clock reading, or zero if none is registered.
    pub fn read_persistent_clock(&self) -> Timespec {
        self.persistent_clock
            .as_ref()
            .map_or(Timespec::ZERO, |clock| clock.read())
    }

    /// Whether both derived clocks are installed.
    pub fn has_clocks(&self) -> bool {
        self.sched_clock.is_some() && self.persistent_clock.is_some()
    }
}

impl TimeSubsystem for TimeRegistry {
    fn register_clocksource(&mut self, info: &ClockSourceInfo) -> ClockResult<()> {
        if self.refuse_clocksources {
            return Err(ClockError::Registration(format!(
                "clocksource {} rejected",
                info.name
            )));
        }
        self.clocksources.push(info.clone());
        Ok(())
    }

    fn register_sched_clock(&mut self, clock: Arc<SchedClock>) {
        self.sched_clock = Some(clock);
    }

    fn register_persistent_clock(&mut self, clock: Arc<Persistent>) {
        self.persistent_clock = Some(clock);
    }
}

/// Handle to the brought-up counter clocks.
#[derive(Debug, Clone)]
pub struct Counter32k {
    clocksource: Arc<ClockSource>,
    monotonic: Arc<SchedClock>,
    persistent: Arc<Persistent>,
    update_interval: Duration,
}

impl Counter32k {
    /// The offset-adjusted clocksource.
    pub fn clocksource(&self) -> &Arc<ClockSource> {
        &self.clocksource
    }

    /// The scheduler clock.
    pub fn monotonic(&self) -> &Arc<SchedClock> {
        &self.monotonic
    }

    /// The persistent clock.
    pub fn persistent(&self) -> &Arc<Persistent> {
        &self.persistent
    }

    /// Period at which [`MonotonicClock::update`] must run.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Start a background thread re-basing the scheduler clock every
    /// [`update_interval`](Self::update_interval).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Timer`] if the thread cannot be spawned.
    pub fn start_rebase_timer(&self) -> ClockResult<RebaseTimer> {
        let mut timer = RebaseTimer::new(self.update_interval);
        timer.start(Arc::clone(&self.monotonic))?;
        Ok(timer)
    }
}

/// Resolve the scheduler-clock scale from configuration.
///
/// Fixed constants are accepted only if they match the pair derived from
/// the counter frequency.
fn sched_clock_scale(config: &ClockConfig) -> ClockResult<Scale> {
    let max_secs = u32::try_from(config.max_conversion.as_secs()).unwrap_or(u32::MAX);
    match config.scale {
        Some(fixed) => Scale::verified(fixed, config.frequency_hz, max_secs).map_err(|e| {
            error!(%e, "Fix multiply/shift to avoid scheduler clock hiccups");
            e
        }),
        None => Scale::for_frequency(config.frequency_hz, max_secs),
    }
}

/// Bring up the 32k counter clocks and register them.
///
/// Configuration problems and an unsupported platform abort bring-up before
/// anything is registered. A missing interface clock and a refused
/// clocksource registration are logged and tolerated: the derived clocks
/// are still installed.
///
/// # Errors
///
/// Returns [`ClockError::Config`] or [`ClockError::ScaleMismatch`] for bad
/// configuration and [`ClockError::UnsupportedPlatform`] when the platform
/// has no counter.
pub fn init_counter_32k<P, T>(
    platform: &P,
    config: &ClockConfig,
    subsystem: &mut T,
    boot_time: Timespec,
) -> ClockResult<Counter32k>
where
    P: CounterPlatform + ?Sized,
    T: TimeSubsystem + ?Sized,
{
    config.validate()?;
    let scale = sched_clock_scale(config)?;
    let info = ClockSourceInfo::from_config(config)?;
    let mask = config.mask();
    let update_interval = config
        .update_interval
        .unwrap_or_else(|| default_update_interval(scale, mask));
    if update_interval.is_zero() {
        return Err(ClockError::Config(format!(
            "counter wraps too fast to re-base: wrap period {}ns",
            scale.wrap_period_ns(mask)
        )));
    }

    let raw = platform.counter_source().map_err(|e| {
        error!(%e, "No 32k counter for this platform");
        e
    })?;

    if let Some(name) = &config.interface_clock {
        if let Err(e) = platform.enable_counter_clock(name) {
            warn!(clock = %name, %e, "Interface clock not enabled, reading counter anyway");
        }
    }

    let clocksource = Arc::new(ClockSource::new(info, raw));
    clocksource.enable();

    if let Err(e) = subsystem.register_clocksource(clocksource.info()) {
        error!(name = %clocksource.info().name, %e, "Can't register clocksource");
    }

    let monotonic = Arc::new(MonotonicClock::new(
        Arc::clone(&clocksource),
        scale,
        mask,
        config.frequency_hz,
    ));
    monotonic.init();

    let persistent = Arc::new(PersistentClock::new(
        Arc::clone(&clocksource),
        clocksource.info().scale,
        mask,
        boot_time,
    ));

    subsystem.register_sched_clock(Arc::clone(&monotonic));
    subsystem.register_persistent_clock(Arc::clone(&persistent));


    info!(
        name = %clocksource.info().name,
        update_interval = %humantime::format_duration(update_interval),
        "32k counter clocks registered"
    );

    Ok(Counter32k {
        clocksource,
        monotonic,
        persistent,
        update_interval,
    })
}

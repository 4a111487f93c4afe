//! Heat generator with idle-timeout safety shutoff
//!
//! Switching the generator on arms a monitor thread. Every [`Generator::touch`]
//! (and every repeated `turn_on`) restarts the idle period; if the period
//! elapses without activity the monitor forces the generator off. On-time of
//! every session is accumulated in a [`UsageCounter`].
//!
//! The monitor waits on a channel rather than sleeping, so cancelling it at
//! any point (explicit `turn_off`, drop) returns promptly and never panics.
//! The shutoff decision is taken under the same lock as activity, so a
//! `turn_on` is never followed by a stale idle shutoff.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{info, warn};

use super::ActuatorError;
use crate::modbus::ModbusClient;

/// Accumulated generator on-time
#[derive(Debug, Default)]
pub struct UsageCounter {
    total_ms: AtomicU64,
    sessions: AtomicU64,
}

impl UsageCounter {
    fn record(&self, elapsed: Duration) {
        self.total_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> Duration {
        Duration::from_millis(self.total_ms.load(Ordering::Relaxed))
    }

    /// Number of completed on/off sessions.
    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }
}

struct PowerState {
    on_since: Option<Instant>,
    last_activity: Instant,
    /// An idle monitor thread is running and owns the shutoff decision
    monitored: bool,
}

struct GeneratorShared {
    client: ModbusClient,
    coil: u16,
    state: Mutex<PowerState>,
    usage: UsageCounter,
}

impl GeneratorShared {
    /// Switch on and record activity. Returns true when a monitor must be started.
    fn switch_on(&self) -> Result<bool, ActuatorError> {
        let mut state = self.state.lock().unwrap();
        if state.on_since.is_none() {
            self.client.write_coil(self.coil, true)?;
            state.on_since = Some(Instant::now());
            info!("Generator on");
        }
        Ok(Self::mark_activity(&mut state))
    }

    /// Record activity if on. Returns true when a monitor must be started.
    fn touch(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.on_since.is_some() && Self::mark_activity(&mut state)
    }

    fn mark_activity(state: &mut PowerState) -> bool {
        state.last_activity = Instant::now();
        let start_monitor = !state.monitored;
        state.monitored = true;
        start_monitor
    }

    fn switch_off(&self, reason: &str) -> Result<(), ActuatorError> {
        let mut state = self.state.lock().unwrap();
        self.switch_off_locked(&mut state, reason)?;
        state.monitored = false;
        Ok(())
    }

    fn switch_off_locked(
        &self,
        state: &mut PowerState,
        reason: &str,
    ) -> Result<(), ActuatorError> {
        if let Some(start) = state.on_since {
            self.client.write_coil(self.coil, false)?;
            state.on_since = None;
            let elapsed = start.elapsed();
            self.usage.record(elapsed);
            info!("Generator off ({reason}) after {:.1}s", elapsed.as_secs_f64());
        }
        Ok(())
    }

    /// Idle check run by the monitor. Returns the remaining wait, or `None`
    /// once the monitor should exit. Activity and this decision share a lock,
    /// so a touch either extends the wait or finds the monitor gone.
    fn check_idle(&self, idle_timeout: Duration) -> Option<Duration> {
        let mut state = self.state.lock().unwrap();
        if !state.monitored {
            return None;
        }
        let idle = state.last_activity.elapsed();
        if state.on_since.is_some() && idle < idle_timeout {
            return Some(idle_timeout - idle);
        }
        if state.on_since.is_some() {
            warn!("Generator idle for {:.1}s, forcing off", idle.as_secs_f64());
            if let Err(e) = self.switch_off_locked(&mut state, "idle timeout") {
                warn!("Generator idle shutoff failed, retrying: {e}");
                return Some(idle_timeout);
            }
        }
        state.monitored = false;
        None
    }

    fn is_on(&self) -> bool {
        self.state.lock().unwrap().on_since.is_some()
    }
}

struct IdleMonitor {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl IdleMonitor {
    fn stop(self) {
        let _ = self.cancel.send(());
        if self.handle.join().is_err() {
            warn!("Generator idle monitor thread panicked");
        }
    }
}

/// Heat generator on a single enable coil.
pub struct Generator {
    shared: Arc<GeneratorShared>,
    idle_timeout: Duration,
    /// Serializes on/touch/off against each other
    monitor: Mutex<Option<IdleMonitor>>,
}

impl Generator {
    pub fn new(client: ModbusClient, coil: u16, idle_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(GeneratorShared {
                client,
                coil,
                state: Mutex::new(PowerState {
                    on_since: None,
                    last_activity: Instant::now(),
                    monitored: false,
                }),
                usage: UsageCounter::default(),
            }),
            idle_timeout,
            monitor: Mutex::new(None),
        }
    }

    /// Switch on (if off) and restart the idle period.
    pub fn turn_on(&self) -> Result<(), ActuatorError> {
        let mut monitor = self.monitor.lock().unwrap();
        if self.shared.switch_on()? {
            self.start_monitor(&mut monitor);
        }
        Ok(())
    }

    /// Restart the idle period while the generator is in use.
    pub fn touch(&self) {
        let mut monitor = self.monitor.lock().unwrap();
        if self.shared.touch() {
            self.start_monitor(&mut monitor);
        }
    }

    /// Switch off and stop the idle monitor.
    pub fn turn_off(&self) -> Result<(), ActuatorError> {
        let mut monitor = self.monitor.lock().unwrap();
        // On a failed write the monitor stays armed and retries at expiry
        self.shared.switch_off("requested")?;
        if let Some(m) = monitor.take() {
            m.stop();
        }
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.shared.is_on()
    }

    pub fn usage(&self) -> &UsageCounter {
        &self.shared.usage
    }

    fn start_monitor(&self, slot: &mut Option<IdleMonitor>) {
        // A previous monitor has already given up the shutoff decision
        if let Some(old) = slot.take() {
            old.stop();
        }

        let (cancel, cancelled) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let idle_timeout = self.idle_timeout;
        let handle = thread::spawn(move || {
            let mut wait = idle_timeout;
            loop {
                match cancelled.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => match shared.check_idle(idle_timeout) {
                        Some(remaining) => wait = remaining,
                        None => break,
                    },
                }
            }
        });

        *slot = Some(IdleMonitor { cancel, handle });
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        if let Err(e) = self.turn_off() {
            warn!("Generator shutdown on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::MockTransport;

    const COIL: u16 = 16;

    fn make_generator(idle: Duration) -> (Generator, MockTransport) {
        let mock = MockTransport::new();
        let client = ModbusClient::new(Box::new(mock.clone()), 1);
        (Generator::new(client, COIL, idle), mock)
    }

    #[test]
    fn test_idle_timeout_forces_off() {
        let (generator, mock) = make_generator(Duration::from_millis(50));
        generator.turn_on().unwrap();
        assert!(mock.coil(COIL));

        thread::sleep(Duration::from_millis(300));

        assert!(!generator.is_on());
        assert!(!mock.coil(COIL));
        assert_eq!(generator.usage().sessions(), 1);
        assert!(generator.usage().total() >= Duration::from_millis(40));
    }

    #[test]
    fn test_touch_keeps_generator_on() {
        let (generator, mock) = make_generator(Duration::from_millis(200));
        generator.turn_on().unwrap();

        for _ in 0..6 {
            thread::sleep(Duration::from_millis(50));
            generator.touch();
        }
        assert!(generator.is_on());
        assert!(mock.coil(COIL));

        generator.turn_off().unwrap();
        assert!(!mock.coil(COIL));
    }

    #[test]
    fn test_cancel_mid_wait_is_clean() {
        let (generator, mock) = make_generator(Duration::from_secs(30));
        generator.turn_on().unwrap();
        generator.turn_off().unwrap();
        generator.turn_off().unwrap();

        assert_eq!(mock.coil_writes(COIL), vec![true, false]);
        assert_eq!(generator.usage().sessions(), 1);
    }

    #[test]
    fn test_repeated_on_writes_coil_once() {
        let (generator, mock) = make_generator(Duration::from_secs(30));
        generator.turn_on().unwrap();
        generator.turn_on().unwrap();
        assert_eq!(mock.coil_writes(COIL), vec![true]);
    }

    #[test]
    fn test_turn_on_near_idle_expiry_is_not_undone() {
        let idle = Duration::from_millis(5);
        let (generator, mock) = make_generator(idle);

        for i in 0..60 {
            thread::sleep(Duration::from_micros(4_000 + (i % 5) * 500));
            let before = Instant::now();
            generator.turn_on().unwrap();
            let on = generator.is_on();
            if before.elapsed() < idle {
                assert!(on, "switched off right after turn_on (iteration {i})");
            }
        }

        // Still monitored: the last session ends on its own
        thread::sleep(Duration::from_millis(100));
        assert!(!generator.is_on());
        assert!(!mock.coil(COIL));
    }

    #[test]
    fn test_rearm_after_idle_shutoff() {
        let (generator, mock) = make_generator(Duration::from_millis(30));
        generator.turn_on().unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(!generator.is_on());

        generator.turn_on().unwrap();
        assert!(generator.is_on());
        generator.turn_off().unwrap();
        assert_eq!(mock.coil_writes(COIL), vec![true, false, true, false]);
        assert_eq!(generator.usage().sessions(), 2);
    }
}

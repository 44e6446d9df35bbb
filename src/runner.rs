//! Periodic evaluation loop.
//!
//! [`Runner`] owns the [`CareService`] together with its adapters and
//! drives it at a fixed interval.  Commands from other threads (a console,
//! a UI) arrive on an mpsc channel and are applied in arrival order before
//! the next evaluation, so the service itself never needs a lock.
//!
//! Every cycle is timed against the interval; overruns are counted the
//! way a real-time scheduler counts deadline misses.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::app::commands::CareCommand;
use crate::app::ports::{ActuatorPort, ClockPort, ConfigPort, EventSink, NotifierPort, SensorPort};
use crate::app::service::CareService;

/// Loop timing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub commands: u64,
    pub deadline_misses: u64,
    pub worst_case: Duration,
}

pub struct Runner<H, N, S, C, P> {
    service: CareService,
    hw: H,
    notifier: N,
    sink: S,
    clock: C,
    store: P,
    interval: Duration,
    tx: Sender<CareCommand>,
    rx: Receiver<CareCommand>,
    stats: RunStats,
}

impl<H, N, S, C, P> Runner<H, N, S, C, P>
where
    H: SensorPort + ActuatorPort,
    N: NotifierPort,
    S: EventSink,
    C: ClockPort,
    P: ConfigPort,
{
    /// Build a runner around `service` and start it.
    pub fn new(
        mut service: CareService,
        hw: H,
        notifier: N,
        mut sink: S,
        clock: C,
        store: P,
        interval: Duration,
    ) -> Self {
        service.start(&mut sink);
        let (tx, rx) = mpsc::channel();
        Self {
            service,
            hw,
            notifier,
            sink,
            clock,
            store,
            interval,
            tx,
            rx,
            stats: RunStats::default(),
        }
    }

    /// A handle other threads use to submit commands.
    pub fn command_sender(&self) -> Sender<CareCommand> {
        self.tx.clone()
    }

    /// Queue a command from the owning thread.
    pub fn submit(&self, cmd: CareCommand) {
        if let Err(e) = self.tx.send(cmd) {
            warn!("Runner: command {} dropped: channel closed", e.0.name());
        }
    }

    /// One cycle: read the clock, apply queued commands, evaluate, and
    /// persist configuration if a save was requested.
    pub fn step(&mut self) {
        let start = Instant::now();
        let now = self.clock.now();

        loop {
            match self.rx.try_recv() {
                Ok(cmd) => {
                    self.stats.commands += 1;
                    self.service.handle_command(
                        cmd,
                        now,
                        &mut self.hw,
                        &mut self.notifier,
                        &mut self.sink,
                    );
                }
                // `self.tx` keeps the channel open.
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        self.service
            .tick(now, &mut self.hw, &mut self.notifier, &mut self.sink);
        if let Err(e) = self.service.save_if_requested(&self.store) {
            warn!("Runner: config save failed, will retry: {e}");
        }

        let elapsed = start.elapsed();
        if elapsed > self.interval {
            self.stats.deadline_misses += 1;
            warn!(
                "Runner: cycle took {elapsed:?}, over the {:?} interval",
                self.interval
            );
        }
        if elapsed > self.stats.worst_case {
            self.stats.worst_case = elapsed;
        }
        self.stats.cycles += 1;
    }

    /// Run `max_ticks` cycles (forever if zero), sleeping out the rest of
    /// each interval.  `before_tick` runs ahead of every cycle with the
    /// cycle number and the hardware, so a simulation can script inputs.
    pub fn run<F>(&mut self, max_ticks: u64, mut before_tick: F) -> RunStats
    where
        F: FnMut(u64, &mut H),
    {
        info!(
            "Runner: interval {:?}, {}",
            self.interval,
            if max_ticks == 0 {
                "until stopped".to_string()
            } else {
                format!("{max_ticks} ticks")
            }
        );

        let mut n = 0;
        while max_ticks == 0 || n < max_ticks {
            let cycle_start = Instant::now();
            before_tick(n, &mut self.hw);
            self.step();
            n += 1;

            let elapsed = cycle_start.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }

        info!(
            "Runner: stopped after {} cycles, {} deadline misses, worst {:?}",
            self.stats.cycles, self.stats.deadline_misses, self.stats.worst_case
        );
        self.stats
    }

    pub fn service(&self) -> &CareService {
        &self.service
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }
}

//! Care service — the hexagonal core.
//!
//! [`CareService`] owns the FSM and its shared context.  It exposes a
//! hardware-agnostic API; all I/O flows through port traits passed in at
//! the call site, so the whole engine runs against mock adapters in tests.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          CareService          │
//! ActuatorPort ◀──│ Presence · Scheduler · FSM    │ ──▶ NotifierPort
//!                 └──────────────────────────────┘
//! ```
//!
//! One call to [`CareService::tick`] is one evaluation cycle.  Nothing in
//! here blocks, and no failure of an adapter changes the engine's state.

use chrono::NaiveDateTime;
use log::{info, warn};
use serde_json::json;

use crate::config::CareConfig;
use crate::error::NotifyError;
use crate::fsm::context::{ActuatorCommands, Buzzer, CareContext, Led};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::notify::{self, Alert};
use crate::schedule::{DueMedication, TimeOfDay, snooze_target};

use super::commands::{CareCommand, HelpSource};
use super::ports::{ActuatorCommand, ActuatorPort, ConfigPort, EventSink, NotifierPort, SensorPort};

/// Servo angle that opens a compartment door.
pub const COMPARTMENT_OPEN_ANGLE: u8 = 90;

// ───────────────────────────────────────────────────────────────
// EngineState
// ───────────────────────────────────────────────────────────────

/// Read-only view of the controller's working memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub global_state: StateId,
    pub last_presence_at: NaiveDateTime,
    pub checkin_started_at: Option<NaiveDateTime>,
    pub pending_medication: Option<DueMedication>,
}

impl EngineState {
    /// `pending_medication` is set iff REMINDER, `checkin_started_at`
    /// iff CHECK_IN.
    pub fn is_consistent(&self) -> bool {
        let reminder = self.global_state == StateId::Reminder;
        let checkin = self.global_state == StateId::CheckIn;
        self.pending_medication.is_some() == reminder && self.checkin_started_at.is_some() == checkin
    }
}

// ───────────────────────────────────────────────────────────────
// CareService
// ───────────────────────────────────────────────────────────────

/// The care service orchestrates all engine logic.
pub struct CareService {
    fsm: Fsm,
    ctx: CareContext,
    /// Last actuator state the device acknowledged.
    applied: Option<ActuatorCommands>,
    config_dirty: bool,
    save_requested: bool,
}

impl CareService {
    /// Construct the service.  Does **not** start the FSM; call
    /// [`start`](Self::start) next.
    pub fn new(config: CareConfig, now: NaiveDateTime) -> Self {
        let ctx = CareContext::new(config, now);
        let fsm = Fsm::new(build_state_table(), StateId::Safe);
        Self {
            fsm,
            ctx,
            applied: None,
            config_dirty: false,
            save_requested: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in its initial state (SAFE).
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        let state = self.fsm.current_state();
        self.ctx.record("engine_started", json!({ "state": state.name() }));
        self.flush_events(sink);
        info!("CareService started in {}", state.name());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one evaluation cycle: read sensors → presence → FSM →
    /// notifier → actuators → log.
    ///
    /// `hw` satisfies both [`SensorPort`] and [`ActuatorPort`]; this
    /// avoids a double mutable borrow while keeping the port boundary
    /// explicit.
    pub fn tick(
        &mut self,
        now: NaiveDateTime,
        hw: &mut (impl SensorPort + ActuatorPort),
        notifier: &mut impl NotifierPort,
        sink: &mut impl EventSink,
    ) {
        // 1. Sensors; the snapshot's timestamp is the tick's time
        let snapshot = hw.read(now);
        self.ctx.observe(snapshot);

        // 2. State machine (pure)
        self.fsm.tick(&mut self.ctx);

        // 3. Escalations requested by the tick
        self.dispatch_escalations(notifier);

        // 4. Actuators, then the log
        self.apply_actuators(hw);
        self.flush_events(sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command between ticks.
    pub fn handle_command(
        &mut self,
        cmd: CareCommand,
        now: NaiveDateTime,
        hw: &mut (impl SensorPort + ActuatorPort),
        notifier: &mut impl NotifierPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now = now;
        let state = self.fsm.current_state();

        match cmd {
            CareCommand::MedTaken if state == StateId::Reminder => self.med_taken(hw),
            CareCommand::MedSnooze { minutes } if state == StateId::Reminder && minutes > 0 => {
                self.med_snooze(minutes);
            }
            CareCommand::MedSkip if state == StateId::Reminder => self.med_skip(),
            CareCommand::CheckInOk if state == StateId::CheckIn => {
                info!("CHECK_IN: person confirmed wellbeing");
                self.ctx.record("checkin_ok", json!({}));
                self.fsm.force_transition(StateId::Safe, &mut self.ctx);
            }
            CareCommand::Silence => self.silence(hw),
            CareCommand::HelpRequest { transcript, source } => {
                self.help_request(&transcript, source);
            }
            CareCommand::LedOff => {
                if state == StateId::Safe {
                    self.ctx.commands.led = Led::Off;
                }
                self.ctx.help_led_since = None;
                self.ctx.record("led_off", json!({}));
            }
            CareCommand::OpenCompartment { drug } => self.open_compartment(&drug, hw),
            CareCommand::NotifyContact(target) => {
                let alert = Alert::manual(&self.ctx.config.profile.name);
                self.ctx.escalations.push((target, alert));
            }
            CareCommand::UpdateConfig(config) => self.update_config(config),
            CareCommand::SaveConfig => {
                self.save_requested = true;
                info!("Explicit config save requested");
            }
            ignored => {
                warn!("Command {} ignored in {}", ignored.name(), state.name());
                self.ctx.record(
                    "command_ignored",
                    json!({ "command": ignored.name(), "state": state.name() }),
                );
            }
        }

        self.dispatch_escalations(notifier);
        self.apply_actuators(hw);
        self.flush_events(sink);
    }

    fn med_taken(&mut self, hw: &mut impl ActuatorPort) {
        let Some(due) = self.ctx.pending_medication.clone() else {
            return;
        };
        info!("REMINDER: {} taken", due.entry.drug);
        self.ctx
            .ledger
            .mark_handled(&due.entry.drug, self.ctx.now.date(), &due.due_times);
        self.ctx.record(
            "med_taken",
            json!({
                "drug": due.entry.drug,
                "dose": due.entry.dose,
                "due_times": due.due_times_display(),
            }),
        );
        if due.entry.compartment.is_some() {
            self.open_compartment(&due.entry.drug, hw);
        }
        self.fsm.force_transition(StateId::Safe, &mut self.ctx);
    }

    fn med_snooze(&mut self, minutes: u32) {
        let Some(due) = self.ctx.pending_medication.clone() else {
            return;
        };
        let target = snooze_target(self.ctx.now, minutes);
        let time = TimeOfDay::from_time(target.time());

        if let Some(entry) = self
            .ctx
            .config
            .schedule
            .iter_mut()
            .find(|e| e.drug == due.entry.drug)
        {
            if entry.add_time(time) {
                self.config_dirty = true;
            }
        }
        let date = self.ctx.now.date();
        self.ctx.ledger.mark_handled(&due.entry.drug, date, &due.due_times);
        self.ctx.ledger.defer(&due.entry.drug, target);

        info!("REMINDER: {} snoozed {} min (until {})", due.entry.drug, minutes, time);
        self.ctx.record(
            "med_snooze",
            json!({ "drug": due.entry.drug, "mins": minutes, "until": time.to_string() }),
        );
        self.fsm.force_transition(StateId::Safe, &mut self.ctx);
    }

    fn med_skip(&mut self) {
        let Some(due) = self.ctx.pending_medication.clone() else {
            return;
        };
        info!("REMINDER: {} skipped", due.entry.drug);
        let date = self.ctx.now.date();
        self.ctx.ledger.mark_handled(&due.entry.drug, date, &due.due_times);
        self.ctx.record(
            "med_skipped",
            json!({ "drug": due.entry.drug, "due_times": due.due_times_display() }),
        );
        self.fsm.force_transition(StateId::Safe, &mut self.ctx);
    }

    /// The manual escape hatch: valid from any state.
    fn silence(&mut self, hw: &mut impl SensorPort) {
        let from = self.fsm.current_state();
        hw.clear_latches();
        self.ctx.sensors.sos = false;
        self.ctx.sensors.fall = false;
        self.fsm.force_transition(StateId::Safe, &mut self.ctx);
        self.ctx.commands.buzzer = Buzzer::Off;
        info!("Silence/reset from {}", from.name());
        self.ctx.record("silence", json!({ "from": from.name() }));
    }

    fn help_request(&mut self, transcript: &str, source: HelpSource) {
        let wake = self.ctx.config.rules.wake_word.clone();
        if !transcript.to_lowercase().contains(&wake.to_lowercase()) {
            self.ctx.record("help_ignored", json!({ "cmd": transcript }));
            return;
        }
        info!("Help requested by wake word {wake:?}");
        if self.fsm.current_state() == StateId::Safe {
            self.ctx.commands.led = Led::On;
            self.ctx.help_led_since = Some(self.ctx.now);
        }
        self.ctx.record(
            "led_on",
            json!({ "wake": wake, "cmd": transcript, "source": source }),
        );
    }

    fn open_compartment(&mut self, drug: &str, hw: &mut impl ActuatorPort) {
        let compartment = self
            .ctx
            .config
            .schedule
            .iter()
            .find(|e| e.drug == drug)
            .and_then(|e| e.compartment);
        let Some(compartment) = compartment else {
            warn!("Dispenser: no compartment configured for {drug:?}");
            self.ctx.record("open_compartment_failed", json!({ "name": drug }));
            return;
        };

        let command = ActuatorCommand::Servo {
            compartment,
            angle: COMPARTMENT_OPEN_ANGLE,
        };
        if let Err(e) = hw.act(&command) {
            warn!("Dispenser: compartment {compartment} command failed: {e}");
        }
        self.ctx.record(
            "open_compartment",
            json!({ "name": drug, "compartment": compartment }),
        );
    }

    fn update_config(&mut self, config: CareConfig) {
        match config.validate() {
            Ok(()) => {
                self.ctx.config = config;
                self.config_dirty = true;
                info!("Configuration updated at runtime");
                self.ctx.record("config_updated", json!({}));
            }
            Err(e) => {
                warn!("Configuration update rejected: {e}");
                self.ctx
                    .record("config_rejected", json!({ "error": e.to_string() }));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current global state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Snapshot of the controller's working memory.
    pub fn engine_state(&self) -> EngineState {
        EngineState {
            global_state: self.fsm.current_state(),
            last_presence_at: self.ctx.presence.last_presence_at(),
            checkin_started_at: self.ctx.checkin_started_at,
            pending_medication: self.ctx.pending_medication.clone(),
        }
    }

    /// The actuator state the engine intends, delivered or not.
    pub fn commands(&self) -> ActuatorCommands {
        self.ctx.commands
    }

    /// Live configuration (including snoozed times).
    pub fn config(&self) -> &CareConfig {
        &self.ctx.config
    }

    /// Total evaluation cycles run since startup.
    pub fn tick_count(&self) -> u64 {
        self.fsm.tick_count()
    }

    /// Whether the configuration has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    // ── Internal ──────────────────────────────────────────────

    fn dispatch_escalations(&mut self, notifier: &mut impl NotifierPort) {
        let pending = std::mem::take(&mut self.ctx.escalations);
        for (target, alert) in pending {
            match notify::notify(&self.ctx.config.profile, &target, &alert, notifier) {
                Ok(sent) => {
                    self.ctx.record(
                        "notify",
                        json!({
                            "contact": sent.contact,
                            "channel": sent.channel.as_str(),
                            "reason": alert.reason.as_str(),
                        }),
                    );
                }
                Err(e @ NotifyError::NoContactFound(_)) => {
                    warn!("Escalation skipped: {e}");
                    self.ctx.record(
                        "notify_warning",
                        json!({ "target": target.to_string(), "error": e.to_string() }),
                    );
                }
                Err(e) => {
                    warn!("Escalation to {target} failed: {e}");
                    self.ctx.record(
                        "notify_failed",
                        json!({ "target": target.to_string(), "error": e.to_string() }),
                    );
                }
            }
        }
    }

    /// Send whatever changed since the device last acknowledged.  A
    /// failed delivery is retried on the next call.
    fn apply_actuators(&mut self, hw: &mut impl ActuatorPort) {
        let cmds = self.ctx.commands;
        if self.applied == Some(cmds) {
            return;
        }
        let led = match self.applied {
            Some(prev) if prev.led == cmds.led => None,
            _ => Some(cmds.led),
        };
        let buzzer = match self.applied {
            Some(prev) if prev.buzzer == cmds.buzzer => None,
            _ => Some(cmds.buzzer),
        };

        match hw.act(&ActuatorCommand::Signal { led, buzzer }) {
            Ok(()) => self.applied = Some(cmds),
            Err(e) => warn!("Actuator command failed, will retry: {e}"),
        }
    }

    fn flush_events(&mut self, sink: &mut impl EventSink) {
        for event in self.ctx.events.drain(..) {
            sink.emit(&event);
        }
    }

    // ── Config persistence ────────────────────────────────────

    /// Save the live configuration if a save was requested.  Returns
    /// `Ok(true)` if it was written.  On failure the request stays
    /// pending and the next call tries again.
    pub fn save_if_requested(&mut self, store: &impl ConfigPort) -> crate::Result<bool> {
        if !self.save_requested {
            return Ok(false);
        }
        store.save_all(&self.ctx.config)?;
        self.save_requested = false;
        self.config_dirty = false;
        info!("Config saved");
        Ok(true)
    }
}

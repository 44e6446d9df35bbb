//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId    │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Safe       │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ Reminder   │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ AlertFall  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ CheckIn    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  └────────────┴───────────┴──────────┴───────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut CareContext`, which
//! holds the sensor snapshot, intended actuator outputs, configuration
//! and the engine's working memory.

pub mod context;
pub mod states;

use context::CareContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// The engine's global operating state.  Exactly one holds at a time.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Safe = 0,
    Reminder = 1,
    AlertFall = 2,
    CheckIn = 3,
}

impl StateId {
    /// Number of states; sizes the table array.
    pub const COUNT: usize = 4;

    /// Convert a table index back to `StateId`.  Out-of-range indices
    /// assert in debug builds and fall back to `Safe` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Safe,
            1 => Self::Reminder,
            2 => Self::AlertFall,
            3 => Self::CheckIn,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Safe
            }
        }
    }

    /// Upper-case name used in logs and event payloads.
    pub fn name(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Reminder => "REMINDER",
            Self::AlertFall => "ALERT_FALL",
            Self::CheckIn => "CHECK_IN",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut CareContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut CareContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and the index of the current state.  The
/// [`CareContext`] is owned by the caller and threaded through every
/// handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut CareContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.state_entered_at = ctx.now;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// Calls `on_update` for the current state and, if it asks for one,
    /// performs the transition.  At most one transition happens per tick.
    pub fn tick(&mut self, ctx: &mut CareContext) {
        self.tick_count += 1;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            if next_id as usize != self.current {
                self.transition(next_id, ctx);
            }
        }
    }

    /// Force an immediate transition, bypassing `on_update`.  Used for
    /// external acknowledgements and the silence/reset action.  A no-op
    /// when already in `next`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut CareContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut CareContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.state_entered_at = ctx.now;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

//! Computer player: scheduler, processes, checks, events, tasks
//!
//! Each computer player is an explicit object owning its own process
//! table, check table, event table, task list head, and per-turn action
//! budget. One call to `process_computer_player` per turn does a bounded
//! amount of work: reactive events and due checks fire, scheduled tasks
//! step, and the process state machine advances by one phase.

pub mod checks;
pub mod dig;
pub mod events;
pub mod process;
pub mod tasks;

use crate::actions::{ActionResult, GameAction};
use crate::core::types::{GameTurn, PlayerId, SlabPos, TaskIndex};
use crate::game::Game;

pub use checks::ComputerCheck;
pub use dig::{ComputerDig, DigResult};
pub use events::ComputerEvent;
pub use process::{ComputerProcess, ProcessCheck, ProcessStep};
pub use tasks::{ComputerTask, TaskKind, TaskPool};

/// Backoff after a process reports a transient blocker
const PROCESS_RETRY_SOON: GameTurn = 20;
/// Backoff after a process reports it is not applicable
const PROCESS_RETRY_LATER: GameTurn = 200;

/// Scheduler phase of the process state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Looking for the next process to start
    Select,
    /// Stepping the ongoing process
    Perform,
    /// Idle backoff between processes
    Wait,
}

pub struct Computer {
    pub player: PlayerId,
    pub processes: Vec<ComputerProcess>,
    pub checks: Vec<ComputerCheck>,
    pub events: Vec<ComputerEvent>,
    /// Head of this player's task list in the shared pool
    pub task_idx: TaskIndex,
    pub task_state: TaskState,
    pub ongoing_process: Option<usize>,
    /// Remaining idle turns while in `Wait`
    pub gameturn_delay: GameTurn,
    /// Idle turns granted when entering `Wait`
    pub gameturn_wait: GameTurn,
    /// Turns between task-stepping passes
    pub sched_interval: GameTurn,
    /// Per-turn action budget; reset to 1 at turn start, decremented per
    /// successful action. Never exceeds 1.
    pub tasks_did: i32,
    /// Remembered good trap spots, bounded
    pub trap_locations: Vec<SlabPos>,
}

impl Computer {
    /// Standard loadout: full process book, check table, and event table.
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            processes: process::standard_processes(),
            checks: checks::standard_checks(),
            events: events::standard_events(),
            task_idx: TaskIndex::INVALID,
            task_state: TaskState::Select,
            ongoing_process: None,
            gameturn_delay: 0,
            gameturn_wait: 20,
            sched_interval: 1,
            tasks_did: 0,
            trap_locations: Vec::new(),
        }
    }

    /// Bare computer with empty tables, for targeted tests.
    #[cfg(test)]
    pub fn new_for_test(player: PlayerId) -> Self {
        Self {
            processes: Vec::new(),
            checks: Vec::new(),
            events: Vec::new(),
            tasks_did: 1,
            ..Self::new(player)
        }
    }
}

/// Budgeted action dispatch for computer code. Refuses outright when the
/// turn's budget is spent; only a successful action consumes it.
pub fn try_game_action(game: &mut Game, comp: &mut Computer, action: GameAction) -> ActionResult {
    if comp.tasks_did <= 0 {
        return ActionResult::Fail;
    }
    let result = crate::actions::game_action(game, comp.player, action);
    if result.is_ok() {
        comp.tasks_did -= 1;
    }
    result
}

/// One full computer turn for `player`.
pub fn process_computer_player(game: &mut Game, player: PlayerId) {
    let Some(mut comp) = game.computers[player.idx()].take() else {
        return;
    };
    comp.tasks_did = 1;

    events::process_computer_events(game, &mut comp);
    checks::process_checks(game, &mut comp);
    if comp.sched_interval <= 1 || game.turn % comp.sched_interval == 0 {
        tasks::process_tasks(game, &mut comp);
    }
    step_scheduler(game, &mut comp);

    if comp.tasks_did < 0 || comp.tasks_did > 1 {
        tracing::error!(
            "player {:?} action budget out of bounds: {}",
            player,
            comp.tasks_did
        );
    }
    game.computers[player.idx()] = Some(comp);
}

fn step_scheduler(game: &mut Game, comp: &mut Computer) {
    match comp.task_state {
        TaskState::Select => {
            let Some(idx) = process::find_best_process(comp, game.turn) else {
                comp.gameturn_delay = comp.gameturn_wait;
                comp.task_state = TaskState::Wait;
                return;
            };
            match process::process_check(game, comp, idx) {
                ProcessCheck::Go => {
                    if process::process_setup(game, comp, idx) {
                        comp.processes[idx].started = true;
                        comp.processes[idx].last_run_turn = game.turn;
                        comp.ongoing_process = Some(idx);
                        comp.task_state = TaskState::Perform;
                        tracing::debug!(
                            "player {:?} starts process '{}'",
                            comp.player,
                            comp.processes[idx].name
                        );
                    } else {
                        comp.processes[idx].suspend_until = game.turn + PROCESS_RETRY_LATER;
                    }
                }
                ProcessCheck::Wait => {
                    comp.processes[idx].suspend_until = game.turn + PROCESS_RETRY_SOON;
                }
                ProcessCheck::Later => {
                    comp.processes[idx].suspend_until = game.turn + PROCESS_RETRY_LATER;
                }
            }
        }
        TaskState::Perform => {
            let Some(idx) = comp.ongoing_process else {
                comp.task_state = TaskState::Select;
                return;
            };
            match process::process_step(game, comp, idx) {
                ProcessStep::Continue => {}
                ProcessStep::Complete => {
                    comp.processes[idx].complete = true;
                    comp.processes[idx].started = false;
                    comp.ongoing_process = None;
                    comp.gameturn_delay = comp.gameturn_wait;
                    comp.task_state = TaskState::Wait;
                    tracing::debug!(
                        "player {:?} completed process '{}'",
                        comp.player,
                        comp.processes[idx].name
                    );
                }
                ProcessStep::Pause => {
                    comp.processes[idx].started = false;
                    comp.processes[idx].suspend_until = game.turn + PROCESS_RETRY_SOON;
                    comp.ongoing_process = None;
                    comp.task_state = TaskState::Select;
                }
            }
        }
        TaskState::Wait => {
            if comp.gameturn_delay <= 1 {
                comp.task_state = TaskState::Select;
            } else {
                comp.gameturn_delay -= 1;
            }
        }
    }
}

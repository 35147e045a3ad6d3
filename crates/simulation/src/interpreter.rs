//! Sequential execution of actions over snapshots.
//!
//! Each action runs inside [`Snapshot::mutate`], so a failing action leaves no
//! trace and the run stops at the first error. Callbacks are plain recursion: the
//! handler freezes its draft, runs the nested actions from there and continues from
//! the last nested snapshot.

use tracing::{debug, trace, warn};

use crate::action::Action;
use crate::config::SimulationConfig;
use crate::draft::Draft;
use crate::error::SimError;
use crate::handlers;
use crate::snapshot::Snapshot;

/// Runs action sequences against snapshots under a fixed configuration.
#[derive(Debug, Clone)]
pub struct Interpreter {
    config: SimulationConfig,
}

impl Interpreter {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Applies `actions` in order and returns the initial snapshot followed by one
    /// snapshot per action.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an action, unchanged.
    pub fn run(&self, initial: &Snapshot, actions: &[Action]) -> Result<Vec<Snapshot>, SimError> {
        let mut execution = Execution::new(&self.config, false);
        let mut snapshots = Vec::with_capacity(actions.len() + 1);
        snapshots.push(initial.clone());

        for (index, action) in actions.iter().enumerate() {
            let current = &snapshots[snapshots.len() - 1];
            let next = execution.step(current, action).inspect_err(|error| {
                warn!(index, kind = action.kind(), %error, "Action failed");
            })?;
            snapshots.push(next);
        }

        debug!(actions = actions.len(), "Simulation complete");
        Ok(snapshots)
    }

    /// Like [`Interpreter::run`], but also records the snapshot produced by every
    /// nested callback action, in execution order. The last element is the final
    /// state.
    pub fn run_traced(
        &self,
        initial: &Snapshot,
        actions: &[Action],
    ) -> Result<Vec<Snapshot>, SimError> {
        let mut execution = Execution::new(&self.config, true);
        let mut current = initial.clone();

        for (index, action) in actions.iter().enumerate() {
            current = execution.step(&current, action).inspect_err(|error| {
                warn!(index, kind = action.kind(), %error, "Action failed");
            })?;
        }

        let mut trace = execution.trace.unwrap_or_default();
        trace.insert(0, initial.clone());
        debug!(actions = actions.len(), snapshots = trace.len(), "Traced simulation complete");
        Ok(trace)
    }

    /// Applies a single action
    pub fn apply(&self, snapshot: &Snapshot, action: &Action) -> Result<Snapshot, SimError> {
        Execution::new(&self.config, false).step(snapshot, action)
    }
}

/// State threaded through one run: configuration, callback depth and the optional
/// trace of intermediate snapshots.
pub(crate) struct Execution<'a> {
    config: &'a SimulationConfig,
    depth: usize,
    trace: Option<Vec<Snapshot>>,
}

impl<'a> Execution<'a> {
    fn new(config: &'a SimulationConfig, traced: bool) -> Self {
        Self {
            config,
            depth: 0,
            trace: traced.then(Vec::new),
        }
    }

    pub(crate) fn config(&self) -> &'a SimulationConfig {
        self.config
    }

    fn step(&mut self, snapshot: &Snapshot, action: &Action) -> Result<Snapshot, SimError> {
        trace!(depth = self.depth, kind = action.kind(), sender = %action.sender(), "Applying action");
        let (next, ()) = snapshot.mutate(|draft| handlers::handle(self, draft, action))?;
        if let Some(trace) = self.trace.as_mut() {
            trace.push(next.clone());
        }
        Ok(next)
    }

    /// Runs `callback` on the current draft state one level deeper and continues
    /// the draft from its result.
    pub(crate) fn run_callback(
        &mut self,
        draft: &mut Draft,
        callback: &[Action],
    ) -> Result<(), SimError> {
        if callback.is_empty() {
            return Ok(());
        }

        let max_depth = self.config.max_callback_depth;
        if self.depth >= max_depth {
            return Err(SimError::CallbackDepthExceeded { max_depth });
        }

        self.depth += 1;
        let result = callback
            .iter()
            .try_fold(draft.freeze(), |current, action| self.step(&current, action));
        self.depth -= 1;

        draft.replace(result?);
        Ok(())
    }
}

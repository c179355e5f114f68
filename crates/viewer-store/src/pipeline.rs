//! Ordered middleware runner.
//!
//! Each middleware receives an action and a [`Chain`]. It may forward the action (or a
//! different one) to the next middleware, drop it, or dispatch follow-up actions that
//! re-enter the chain from the top. Whatever reaches the end of the chain is applied to a
//! working copy of the state with [`reduce`]; the caller commits that copy only when the
//! whole run succeeded.

use tracing::warn;

use crate::action::Action;
use crate::error::{StoreError, StoreResult};
use crate::middleware::{
    AnimationMiddleware, DatasetsMiddleware, LoggingMiddleware, PaletteMiddleware,
    TimeMiddleware, ToolMiddleware,
};
use crate::state::{reduce, State};

/// Maximum nesting of re-entrant dispatches.
pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 32;

/// One stage of the dispatch chain.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()>;
}

/// A middleware's view of the run in progress.
pub struct Chain<'a> {
    middlewares: &'a [Box<dyn Middleware>],
    position: usize,
    depth: usize,
    max_depth: usize,
    state: &'a mut State,
    applied: &'a mut Vec<Action>,
}

impl<'a> Chain<'a> {
    /// State with every action applied so far in this run.
    pub fn state(&self) -> &State {
        self.state
    }

    /// Re-entrant dispatch nesting, 0 for the outermost action.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pass `action` to the next middleware, or to the reducer at the end of the chain.
    pub fn forward(&mut self, action: Action) -> StoreResult<()> {
        let next = self.position + 1;
        let depth = self.depth;
        self.enter(next, depth, action)
    }

    /// Start a follow-up action from the top of the chain.
    pub fn dispatch(&mut self, action: Action) -> StoreResult<()> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            warn!(action = action.kind(), depth, "Dispatch depth exceeded");
            return Err(StoreError::DispatchDepthExceeded {
                depth,
                action: action.kind(),
            });
        }
        self.enter(0, depth, action)
    }

    fn enter(&mut self, position: usize, depth: usize, action: Action) -> StoreResult<()> {
        match self.middlewares.get(position) {
            Some(middleware) => {
                let mut chain = Chain {
                    middlewares: self.middlewares,
                    position,
                    depth,
                    max_depth: self.max_depth,
                    state: &mut *self.state,
                    applied: &mut *self.applied,
                };
                middleware.handle(action, &mut chain)
            }
            None => {
                *self.state = reduce(self.state, &action);
                self.applied.push(action);
                Ok(())
            }
        }
    }
}

/// The ordered middleware list plus its depth bound.
pub struct Pipeline {
    middlewares: Vec<Box<dyn Middleware>>,
    max_depth: usize,
}

impl Pipeline {
    pub fn new(middlewares: Vec<Box<dyn Middleware>>) -> Self {
        Self {
            middlewares,
            max_depth: DEFAULT_MAX_DISPATCH_DEPTH,
        }
    }

    /// The viewer's chain: logging, tool, animation, palette, datasets, time.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(LoggingMiddleware),
            Box::new(ToolMiddleware),
            Box::new(AnimationMiddleware),
            Box::new(PaletteMiddleware),
            Box::new(DatasetsMiddleware),
            Box::new(TimeMiddleware),
        ])
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run `action` against `state`, returning the new state and the actions the reducer saw.
    pub fn run(&self, state: &State, action: Action) -> StoreResult<(State, Vec<Action>)> {
        self.run_at_depth(state, action, 0)
    }

    /// Same as [`run`](Self::run) for an action dispatched while another is being handled.
    pub fn run_at_depth(
        &self,
        state: &State,
        action: Action,
        depth: usize,
    ) -> StoreResult<(State, Vec<Action>)> {
        if depth > self.max_depth {
            return Err(StoreError::DispatchDepthExceeded {
                depth,
                action: action.kind(),
            });
        }

        let mut working = state.clone();
        let mut applied = Vec::new();
        let mut root = Chain {
            middlewares: &self.middlewares,
            position: 0,
            depth,
            max_depth: self.max_depth,
            state: &mut working,
            applied: &mut applied,
        };
        root.enter(0, depth, action)?;
        Ok((working, applied))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{ExportError, Result};

/// The scrollable region the controller manipulates. Offsets and heights are in CSS pixels.
pub trait ScrollSurface {
    fn scroll_top(&self) -> u64;
    fn set_scroll_top(&mut self, top: u64);
    fn scroll_height(&self) -> u64;
    fn client_height(&self) -> u64;

    /// Gives the page time to react; simulated surfaces advance a virtual clock instead.
    fn settle(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollConfig {
    pub step: u64,
    pub step_delay: Duration,
    pub stall_delay: Duration,
    pub stability_delay: Duration,
    pub required_stable_passes: u32,
    pub min_iterations: u32,
    pub iteration_margin: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step: 1200,
            step_delay: Duration::from_millis(300),
            stall_delay: Duration::from_millis(800),
            stability_delay: Duration::from_millis(800),
            required_stable_passes: 2,
            min_iterations: 60,
            iteration_margin: 5,
        }
    }
}

impl ScrollConfig {
    pub fn iteration_cap(&self, initial_top: u64) -> u32 {
        let steps = initial_top.div_ceil(self.step.max(1));
        let derived = u32::try_from(steps)
            .unwrap_or(u32::MAX)
            .saturating_add(self.iteration_margin);
        self.min_iterations.max(derived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    Stepping,
    CheckingTop,
    Stalled,
    MaxIterations,
    Done,
}

impl ScrollState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stalled | Self::MaxIterations | Self::Done)
    }

    fn phase(self) -> &'static str {
        match self {
            Self::Stepping => "stepping",
            Self::CheckingTop => "checking-top",
            Self::Stalled => "stalled",
            Self::MaxIterations => "max-iterations",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub iterations: u32,
    pub iteration_cap: u32,
    pub scroll_height: u64,
}

pub struct ScrollController<'s> {
    surface: &'s mut dyn ScrollSurface,
    config: ScrollConfig,
    state: ScrollState,
    iterations: u32,
    iteration_cap: u32,
    previous_top: u64,
    stable_passes: u32,
}

impl<'s> ScrollController<'s> {
    pub fn new(surface: &'s mut dyn ScrollSurface, config: ScrollConfig) -> Self {
        let previous_top = surface.scroll_top();
        let iteration_cap = config.iteration_cap(previous_top);
        Self {
            surface,
            config,
            state: ScrollState::Stepping,
            iterations: 0,
            iteration_cap,
            previous_top,
            stable_passes: 0,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn iteration_cap(&self) -> u32 {
        self.iteration_cap
    }

    /// Performs one transition. Terminal states are sticky.
    pub fn advance(&mut self) -> ScrollState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.iterations >= self.iteration_cap {
            self.state = ScrollState::MaxIterations;
            self.log();
            return self.state;
        }

        self.iterations += 1;
        self.state = match self.state {
            ScrollState::Stepping => self.step(),
            ScrollState::CheckingTop => self.check_top(),
            terminal => terminal,
        };
        self.log();
        self.state
    }

    /// Advances until a terminal state; only `Done` is a success.
    pub fn run(mut self) -> Result<ScrollReport> {
        while !self.advance().is_terminal() {}

        match self.state {
            ScrollState::Done => Ok(ScrollReport {
                iterations: self.iterations,
                iteration_cap: self.iteration_cap,
                scroll_height: self.surface.scroll_height(),
            }),
            ScrollState::Stalled => Err(ExportError::ScrollStalled),
            _ => Err(ExportError::ScrollIncomplete),
        }
    }

    fn step(&mut self) -> ScrollState {
        let target = self.surface.scroll_top().saturating_sub(self.config.step);
        self.surface.set_scroll_top(target);
        self.surface.settle(self.config.step_delay);

        let mut top = self.surface.scroll_top();
        if top != 0 && top == self.previous_top {
            self.surface.settle(self.config.stall_delay);
            top = self.surface.scroll_top();
            if top == self.previous_top {
                return ScrollState::Stalled;
            }
        }
        if top == 0 {
            self.stable_passes = 0;
            return ScrollState::CheckingTop;
        }
        self.previous_top = top;
        ScrollState::Stepping
    }

    fn check_top(&mut self) -> ScrollState {
        let height_before = self.surface.scroll_height();
        self.surface.settle(self.config.stability_delay);
        let height_after = self.surface.scroll_height();

        if height_after != height_before {
            debug!(height_before, height_after, "older messages loaded above");
            self.stable_passes = 0;
            self.previous_top = self.surface.scroll_top();
            return ScrollState::Stepping;
        }

        self.stable_passes += 1;
        if self.stable_passes >= self.config.required_stable_passes {
            ScrollState::Done
        } else {
            ScrollState::CheckingTop
        }
    }

    fn log(&self) {
        debug!(
            phase = self.state.phase(),
            iteration = self.iterations,
            cap = self.iteration_cap,
            scroll_top = self.surface.scroll_top(),
            scroll_height = self.surface.scroll_height(),
            client_height = self.surface.client_height(),
            stable_passes = self.stable_passes,
            "scroll"
        );
    }
}

pub fn scroll_to_top(
    surface: &mut dyn ScrollSurface,
    config: ScrollConfig,
) -> Result<ScrollReport> {
    ScrollController::new(surface, config).run()
}

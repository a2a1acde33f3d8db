//! Bringing the main window to the foreground.
//!
//! Activation is a table of independent strategies tried in order, with the
//! whole chain retried a bounded number of times. A strategy failing never
//! aborts the chain.

use crate::platforms::{InputInjector, WindowHandle, WindowSystem};
use crate::session::Session;
use crate::{AutomationError, BestEffort, KeyAction};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What counts as a successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationCheck {
    /// The main window must be the foreground window after the strategy ran.
    #[default]
    Verify,
    /// A strategy that returns without error is taken at its word.
    TrustStrategy,
}

/// Everything a strategy may touch.
pub struct ActivationContext<'a> {
    pub windows: &'a dyn WindowSystem,
    pub input: &'a dyn InputInjector,
    pub target: WindowHandle,
    pub title_hint: &'a str,
    pub pause: Duration,
}

impl ActivationContext<'_> {
    fn settle(&self) {
        thread::sleep(self.pause);
    }
}

#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(&ActivationContext<'_>) -> Result<(), AutomationError>,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

fn focus_request(ctx: &ActivationContext<'_>) -> Result<(), AutomationError> {
    ctx.windows.focus_window(ctx.target)?;
    ctx.settle();
    Ok(())
}

fn restore_and_foreground(ctx: &ActivationContext<'_>) -> Result<(), AutomationError> {
    ctx.windows.restore_window(ctx.target)?;
    ctx.settle();
    ctx.windows.set_foreground(ctx.target)?;
    ctx.settle();
    Ok(())
}

fn task_switch(ctx: &ActivationContext<'_>) -> Result<(), AutomationError> {
    ctx.input.send_keys(&KeyAction::task_switch())?;
    ctx.settle();
    ctx.input.send_keys(&KeyAction::alt())?;
    ctx.settle();
    Ok(())
}

fn scan_by_title(ctx: &ActivationContext<'_>) -> Result<(), AutomationError> {
    let hint = ctx.title_hint.to_lowercase();
    if hint.is_empty() {
        return Err(AutomationError::InvalidArgument(
            "empty activation title hint".to_string(),
        ));
    }
    let window = ctx
        .windows
        .find_windows(&|w| w.title.to_lowercase().contains(&hint))?
        .into_iter()
        .next()
        .ok_or_else(|| {
            AutomationError::WindowNotFound(format!("no visible window titled like '{hint}'"))
        })?;
    debug!("Title scan picked {:?}", window.title);
    ctx.windows.restore_window(window.handle)?;
    ctx.settle();
    ctx.windows.set_foreground(window.handle)?;
    ctx.settle();
    Ok(())
}

/// The default chain, most targeted first.
pub const DEFAULT_STRATEGIES: [Strategy; 4] = [
    Strategy {
        name: "focus request",
        run: focus_request,
    },
    Strategy {
        name: "restore and foreground",
        run: restore_and_foreground,
    },
    Strategy {
        name: "task switch",
        run: task_switch,
    },
    Strategy {
        name: "title scan",
        run: scan_by_title,
    },
];

pub struct WindowActivator {
    windows: Arc<dyn WindowSystem>,
    input: Arc<dyn InputInjector>,
    title_hint: String,
    pause: Duration,
    check: ActivationCheck,
    strategies: Vec<Strategy>,
}

impl WindowActivator {
    pub fn new(
        windows: Arc<dyn WindowSystem>,
        input: Arc<dyn InputInjector>,
        title_hint: impl Into<String>,
        pause: Duration,
    ) -> Self {
        Self {
            windows,
            input,
            title_hint: title_hint.into(),
            pause,
            check: ActivationCheck::default(),
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }

    pub fn with_check(mut self, check: ActivationCheck) -> Self {
        self.check = check;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Runs the strategy chain up to `max_attempts` times, sleeping
    /// `retry_delay` between traversals. False once every attempt is spent.
    pub fn activate(&self, session: &Session, max_attempts: u32, retry_delay: Duration) -> bool {
        let ctx = ActivationContext {
            windows: self.windows.as_ref(),
            input: self.input.as_ref(),
            target: session.window(),
            title_hint: &self.title_hint,
            pause: self.pause,
        };

        for attempt in 1..=max_attempts {
            for strategy in &self.strategies {
                let outcome = BestEffort::attempt(strategy.name, || (strategy.run)(&ctx));
                if !outcome.succeeded() {
                    outcome.ok();
                    continue;
                }
                if self.verified(ctx.target) {
                    info!(
                        "Window activated via {} (attempt {}/{})",
                        strategy.name, attempt, max_attempts
                    );
                    return true;
                }
                debug!(
                    "{} ran but {:#x} is not in the foreground",
                    strategy.name, ctx.target.0
                );
            }
            if attempt < max_attempts {
                debug!(
                    "Activation attempt {}/{} failed; retrying in {:?}",
                    attempt, max_attempts, retry_delay
                );
                thread::sleep(retry_delay);
            }
        }
        warn!("Window activation failed after {} attempt(s)", max_attempts);
        false
    }

    fn verified(&self, target: WindowHandle) -> bool {
        match self.check {
            ActivationCheck::TrustStrategy => true,
            ActivationCheck::Verify => BestEffort::attempt("read foreground window", || {
                self.windows.foreground_window()
            })
            .ok()
            .flatten()
                == Some(target),
        }
    }
}

impl std::fmt::Debug for WindowActivator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowActivator")
            .field("title_hint", &self.title_hint)
            .field("pause", &self.pause)
            .field("check", &self.check)
            .field("strategies", &self.strategies)
            .finish_non_exhaustive()
    }
}

//! The execution tracer: script discovery, breakpoints, stepping and the
//! pause rendezvous.
//!
//! The host runtime reports `call`, `line` and `return` events from its
//! threads (see [`crate::agent::Agent`] for the dispatch entry points). The
//! [`Tracer`] holds the breakpoint map and the stepping state machine and
//! blocks a traced thread inside [`Tracer::enter_pause`] until a
//! resume-class command arrives from a client. At most one pause is
//! outstanding across all traced threads.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::broker::Broker;
use crate::protocol::{line_from_wire, BreakpointResult, Location, PausedEvent};
use crate::sync::{lock, wait};

pub mod frame;
pub mod scripts;

use self::frame::FrameRef;

/// Name of the transport worker thread. Connection threads share the
/// prefix; the tracer never pauses a thread whose name carries it.
pub const WORKER_THREAD_NAME: &str = "ChromeDebug";

/// True when the calling thread belongs to the agent's transport.
pub(crate) fn is_worker_thread() -> bool {
    std::thread::current()
        .name()
        .is_some_and(|name| name.starts_with(WORKER_THREAD_NAME))
}

thread_local! {
    static CURRENT_FRAME: RefCell<Option<FrameRef>> = const { RefCell::new(None) };
}

/// Records the innermost frame of the calling thread.
pub(crate) fn set_current_frame(frame: Option<FrameRef>) {
    CURRENT_FRAME.with(|slot| *slot.borrow_mut() = frame);
}

/// The innermost traced frame of the calling thread, if any.
pub fn current_frame() -> Option<FrameRef> {
    CURRENT_FRAME.with(|slot| slot.borrow().clone())
}

/// Automatic stepping policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepMode {
    /// Run until a breakpoint or an explicit pause.
    #[default]
    None,
    /// Stop at the next line anywhere.
    Into,
    /// Stop at the next line at or above the current depth.
    Over,
    /// Stop once the current frame returns.
    Out,
}

#[derive(Debug)]
struct PausedState {
    frame: FrameRef,
    event: PausedEvent,
}

#[derive(Debug, Default)]
struct DebugState {
    breakpoints: HashMap<String, BTreeSet<u32>>,
    breakpoints_active: bool,
    step_mode: StepMode,
    step_level: i64,
    continue_target: Option<(String, u32)>,
    paused: Option<PausedState>,
    resume_epoch: u64,
}

impl DebugState {
    /// A stop consumes the step state so it does not immediately retrigger.
    fn consume_step(&mut self) {
        self.step_mode = StepMode::None;
        self.step_level = 0;
        self.continue_target = None;
    }
}

/// The per-process tracer.
#[derive(Debug)]
pub struct Tracer {
    state: Mutex<DebugState>,
    resume: Condvar,
    attached: AtomicBool,
    base: Mutex<Option<FrameRef>>,
    skip: Vec<String>,
}

impl Tracer {
    /// Creates a detached tracer skipping modules matching `skip` globs.
    pub fn new(skip: Vec<String>) -> Self {
        let state = DebugState { breakpoints_active: true, ..Default::default() };
        Self {
            state: Mutex::new(state),
            resume: Condvar::new(),
            attached: AtomicBool::new(false),
            base: Mutex::new(None),
            skip,
        }
    }

    /// Starts observing trace events.
    pub fn attach(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Stops observing trace events and releases a paused thread, if any,
    /// so the program can run to completion.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        let mut state = lock(&self.state);
        state.paused = None;
        state.resume_epoch += 1;
        self.resume.notify_all();
    }

    /// True while trace events are observed.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Marks the embedding frame: extraction stops there so the agent's own
    /// activation records are never surfaced.
    pub fn set_base_frame(&self, base: Option<FrameRef>) {
        *lock(&self.base) = base;
    }

    /// The embedding frame, if recorded.
    pub fn base_frame(&self) -> Option<FrameRef> {
        lock(&self.base).clone()
    }

    /// True when any frame in `frame`'s ancestor chain belongs to a module
    /// matched by a skip glob.
    pub fn is_skipped(&self, frame: &FrameRef) -> bool {
        let mut cursor = Some(frame);
        while let Some(f) = cursor {
            if self.skip.iter().any(|pattern| glob_match(pattern, f.module())) {
                return true;
            }
            cursor = f.parent();
        }
        false
    }

    /// Stores a breakpoint given in wire form and echoes its location.
    pub fn set_break(&self, module: &str, line_wire: u32) -> BreakpointResult {
        let result = BreakpointResult {
            breakpoint_id: format!("{module}:{line_wire}"),
            locations: vec![Location {
                script_id: module.to_string(),
                line_number: line_wire,
            }],
        };
        if self.is_attached() {
            lock(&self.state)
                .breakpoints
                .entry(module.to_string())
                .or_default()
                .insert(line_from_wire(line_wire));
        }
        result
    }

    /// Removes a breakpoint by its `"<module>:<line>"` id. Unknown ids are
    /// ignored.
    pub fn clear_break(&self, breakpoint_id: &str) {
        if !self.is_attached() {
            return;
        }
        let Some((module, line)) = breakpoint_id.rsplit_once(':') else { return };
        let Ok(line_wire) = line.parse::<u32>() else { return };
        let mut state = lock(&self.state);
        if let Some(lines) = state.breakpoints.get_mut(module) {
            lines.remove(&line_from_wire(line_wire));
            if lines.is_empty() {
                state.breakpoints.remove(module);
            }
        }
    }

    /// Gates the breakpoint check without losing stored breakpoints.
    pub fn set_breakpoints_active(&self, active: bool) {
        if self.is_attached() {
            lock(&self.state).breakpoints_active = active;
        }
    }

    /// Arms a stop at the next executable line on any traced thread.
    pub fn pause_on_next(&self) {
        if self.is_attached() {
            let mut state = lock(&self.state);
            state.step_mode = StepMode::Into;
            state.step_level = 0;
        }
    }

    /// `Debugger.resume`: clears stepping and releases the paused thread.
    /// Returns true when a thread was actually paused.
    pub fn resume(&self) -> bool {
        self.signal_resume(DebugState::consume_step)
    }

    /// `Debugger.stepInto`.
    pub fn step_into(&self) -> bool {
        self.signal_resume(|state| {
            state.step_mode = StepMode::Into;
            state.step_level = 0;
            state.continue_target = None;
        })
    }

    /// `Debugger.stepOver`.
    pub fn step_over(&self) -> bool {
        self.signal_resume(|state| {
            state.step_mode = StepMode::Over;
            state.step_level = 0;
            state.continue_target = None;
        })
    }

    /// `Debugger.stepOut`.
    pub fn step_out(&self) -> bool {
        self.signal_resume(|state| {
            state.step_mode = StepMode::Out;
            state.step_level = 0;
            state.continue_target = None;
        })
    }

    /// `Debugger.continueToLocation`: run until the target line is reached
    /// or passed in the target module.
    pub fn continue_to(&self, module: &str, line_wire: u32) -> bool {
        let target = (module.to_string(), line_from_wire(line_wire));
        self.signal_resume(move |state| {
            state.step_mode = StepMode::None;
            state.step_level = 0;
            state.continue_target = Some(target);
        })
    }

    fn signal_resume(&self, update: impl FnOnce(&mut DebugState)) -> bool {
        if !self.is_attached() {
            return false;
        }
        let mut state = lock(&self.state);
        let was_paused = state.paused.take().is_some();
        update(&mut state);
        state.resume_epoch += 1;
        self.resume.notify_all();
        was_paused
    }

    /// The snapshot published by the outstanding pause, if any.
    pub fn paused_event(&self) -> Option<PausedEvent> {
        lock(&self.state).paused.as_ref().map(|p| p.event.clone())
    }

    /// The innermost frame of the outstanding pause, if any.
    pub fn paused_frame(&self) -> Option<FrameRef> {
        lock(&self.state).paused.as_ref().map(|p| p.frame.clone())
    }

    /// Depth bookkeeping for a `call` event.
    pub(crate) fn note_call(&self) {
        if !self.is_attached() {
            return;
        }
        let mut state = lock(&self.state);
        if matches!(state.step_mode, StepMode::Over | StepMode::Out) {
            state.step_level += 1;
        }
    }

    /// Depth bookkeeping for a `return` event. Returns true when the event
    /// itself warrants a pause (step-out past the starting frame).
    pub(crate) fn note_return(&self) -> bool {
        if !self.is_attached() {
            return false;
        }
        let mut state = lock(&self.state);
        if matches!(state.step_mode, StepMode::Over | StepMode::Out) {
            state.step_level -= 1;
            if state.step_mode == StepMode::Out && state.step_level < 0 {
                state.consume_step();
                return true;
            }
        }
        false
    }

    /// Decides whether a `line` event stops the thread. A positive
    /// decision consumes the step state.
    pub(crate) fn line_decision(&self, frame: &FrameRef) -> bool {
        if !self.is_attached() {
            return false;
        }
        let module = frame.module();
        let line = frame.line();
        let mut state = lock(&self.state);
        let step_stop = match state.step_mode {
            StepMode::Into => true,
            StepMode::Over => state.step_level <= 0,
            StepMode::Out => state.step_level < 0,
            StepMode::None => false,
        };
        let target_stop = state
            .continue_target
            .as_ref()
            .is_some_and(|(m, l)| m == module && line >= *l);
        let breakpoint_stop = state.breakpoints_active
            && state.breakpoints.get(module).is_some_and(|lines| lines.contains(&line));
        let stop = step_stop || target_stop || breakpoint_stop;
        if stop {
            state.consume_step();
        }
        stop
    }

    /// The pause rendezvous. Publishes `event` to every session and blocks
    /// the calling thread until a resume-class command (or detach) arrives.
    ///
    /// Entry is rejected when another frame is already paused, which keeps
    /// at most one pause outstanding across all traced threads. The
    /// broadcast and the start of the wait happen under the state mutex, so
    /// a racing resume cannot slip between them.
    pub(crate) fn enter_pause(&self, frame: &FrameRef, event: PausedEvent, broker: &Broker) {
        let mut state = lock(&self.state);
        if state.paused.is_some() {
            return;
        }
        state.paused = Some(PausedState { frame: frame.clone(), event: event.clone() });
        let epoch = state.resume_epoch;
        broker.debugger_paused(&event);
        while state.resume_epoch == epoch {
            state = wait(&self.resume, state);
        }
        // A resume command normally clears the pause; make sure a stale
        // entry for this very frame never outlives the wait.
        if state.paused.as_ref().is_some_and(|p| Arc::ptr_eq(&p.frame, frame)) {
            state.paused = None;
        }
    }
}

/// Matches shell-style globs supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

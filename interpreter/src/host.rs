use std::collections::HashMap;
use std::time::Duration;

use dncl_core::Span;

use crate::object::RuntimeError;

// Everything the evaluator tells the outside world goes through one event
// stream: regular output, rendered front-end failures, runtime error values,
// and the debug-mode progress events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Stdout(String),
    Clear,
    Error(String),
    RuntimeError(RuntimeError),
    LineEvaluation(usize),
    EnvironmentUpdate(Vec<(String, String)>),
}

pub trait EventSink {
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    Cancel,
}

// Result of pulling one value from the external input source. Exhausted is
// distinct from an empty line; Cancelled aborts the run at this suspension
// point.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    Exhausted,
    Cancelled,
}

pub trait InputSource {
    fn next_input(&mut self) -> Input;
}

// Default input source: one value per line of a pre-supplied text.
pub struct LineInput {
    lines: Vec<String>,
    cursor: usize,
}

impl LineInput {
    pub fn new(text: &str) -> Self {
        LineInput {
            lines: text.lines().map(String::from).collect(),
            cursor: 0,
        }
    }
}

impl InputSource for LineInput {
    fn next_input(&mut self) -> Input {
        match self.lines.get(self.cursor) {
            Some(line) => {
                self.cursor += 1;
                Input::Text(line.clone())
            }
            None => Input::Exhausted,
        }
    }
}

pub trait ImportResolver {
    fn resolve(&mut self, path: &str) -> Option<String>;
}

pub struct NoImports;

impl ImportResolver for NoImports {
    fn resolve(&mut self, _path: &str) -> Option<String> {
        None
    }
}

// In-memory resolver keyed by slash-separated path, mainly for tests and
// embedders that preload their notebook files.
pub struct MapImports {
    files: HashMap<String, String>,
}

impl MapImports {
    pub fn new<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MapImports {
            files: files
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl ImportResolver for MapImports {
    fn resolve(&mut self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

// Fired before every node evaluation in debug mode. The snapshot is the
// flattened environment visible at that node.
pub trait DebugHook {
    fn before_node(&mut self, span: Span, line: usize, snapshot: &[(String, String)])
        -> StepControl;
}

// The cooperative delay used by 待機 and by debug pacing. Hosts that drive
// the interpreter from an event loop substitute their own.
pub trait Pacer {
    fn sleep(&mut self, duration: Duration) -> StepControl;
}

pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn sleep(&mut self, duration: Duration) -> StepControl {
        std::thread::sleep(duration);
        StepControl::Continue
    }
}

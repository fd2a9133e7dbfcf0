//! Change log for the pass pipeline.
//!
//! Every change a pass makes to the module is recorded as an [`Event`] in the
//! [`EventLog`] handed to it. Events can be inspected for debugging or testing
//! and are safe to ignore otherwise.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event (change, warning, info)
//! - [`EventLog`] - Append-only collection with query and summary helpers
//! - [`EventBuilder`] - Fluent construction, committed when dropped
//! - [`PipelineStats`] - Counters derived from a log
//!
//! # Example
//!
//! ```rust
//! use midend::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::InstructionRemoved)
//!     .function("main")
//!     .block("entry")
//!     .message("erased %t3");
//! log.info("starting pipeline");
//!
//! assert_eq!(log.count_kind(EventKind::InstructionRemoved), 1);
//! assert_eq!(log.summary(), "1 instruction removed");
//! ```

use std::{collections::HashMap, fmt};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An instruction was erased.
    InstructionRemoved,
    /// A basic block was removed.
    BlockRemoved,
    /// An unused function was removed from the module.
    FunctionRemoved,
    /// An unused global variable was removed from the module.
    GlobalRemoved,
    /// A phi was placed for a promoted stack slot.
    PhiInserted,
    /// A stack slot was promoted to SSA values.
    MemoryPromoted,
    /// A loop-invariant instruction was moved into a preheader.
    InstructionHoisted,
    /// A preheader block was synthesised for a loop.
    PreheaderCreated,
    /// A phi lost the incoming pairs of a removed predecessor.
    PhiIncomingPruned,

    /// A function was found to be free of side effects.
    PureFunctionIdentified,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::InstructionRemoved => "instruction removed",
            Self::BlockRemoved => "block removed",
            Self::FunctionRemoved => "function removed",
            Self::GlobalRemoved => "global removed",
            Self::PhiInserted => "phi inserted",
            Self::MemoryPromoted => "memory promoted",
            Self::InstructionHoisted => "instruction hoisted",
            Self::PreheaderCreated => "preheader created",
            Self::PhiIncomingPruned => "phi incoming pruned",
            // Analysis
            Self::PureFunctionIdentified => "pure function identified",
            // Pipeline
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            // Diagnostic
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }

    /// Returns true if this event represents a change to the module.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::InstructionRemoved
                | Self::BlockRemoved
                | Self::FunctionRemoved
                | Self::GlobalRemoved
                | Self::PhiInserted
                | Self::MemoryPromoted
                | Self::InstructionHoisted
                | Self::PreheaderCreated
                | Self::PhiIncomingPruned
        )
    }

    /// Returns true if this is a diagnostic event (info/warning).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Name of the function the event concerns (if applicable).
    pub function: Option<String>,
    /// Name of the block within the function (if applicable).
    pub block: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Name of the pass that recorded the event.
    pub pass: Option<&'static str>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            block: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " @{}", function)?;
        }
        if let Some(block) = &self.block {
            write!(f, " %{}", block)?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    block: Option<String>,
    message: Option<String>,
    pass: Option<&'static str>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            block: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function the event concerns.
    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    /// Sets the block the event concerns.
    pub fn block(mut self, name: impl Into<String>) -> Self {
        self.block = Some(name.into());
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a pass.
    pub fn pass(mut self, pass_name: &'static str) -> Self {
        self.pass = Some(pass_name);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            function: self.function.take(),
            block: self.block.take(),
            message,
            pass: self.pass,
        });
    }
}

/// Collection of events recorded by a pipeline run.
///
/// Events are appended through shared references (`&self`); the log is never
/// truncated. Statistics are derived from the events rather than tracked
/// separately.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        for (_, event) in &self.events {
            new_log.events.push(event.clone());
        }
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Appends copies of all events of another log.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over the events recorded for one function.
    pub fn filter_function<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter()
            .filter(move |e| e.function.as_deref() == Some(name))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.transformations().count()
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

/// Iterator over the events of an [`EventLog`].
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Counters derived from an [`EventLog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Passes that completed.
    pub passes_run: usize,
    /// Instructions erased.
    pub instructions_removed: usize,
    /// Blocks removed.
    pub blocks_removed: usize,
    /// Functions removed by the global sweep.
    pub functions_removed: usize,
    /// Globals removed by the global sweep.
    pub globals_removed: usize,
    /// Stack slots promoted to SSA values.
    pub slots_promoted: usize,
    /// Phis placed for promoted slots.
    pub phis_inserted: usize,
    /// Instructions moved into preheaders.
    pub instructions_hoisted: usize,
    /// Preheaders synthesised.
    pub preheaders_created: usize,
    /// Pure functions reported.
    pub pure_functions: usize,
    /// Warnings.
    pub warnings: usize,
}

impl PipelineStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            passes_run: get(EventKind::PassCompleted),
            instructions_removed: get(EventKind::InstructionRemoved),
            blocks_removed: get(EventKind::BlockRemoved),
            functions_removed: get(EventKind::FunctionRemoved),
            globals_removed: get(EventKind::GlobalRemoved),
            slots_promoted: get(EventKind::MemoryPromoted),
            phis_inserted: get(EventKind::PhiInserted),
            instructions_hoisted: get(EventKind::InstructionHoisted),
            preheaders_created: get(EventKind::PreheaderCreated),
            pure_functions: get(EventKind::PureFunctionIdentified),
            warnings: get(EventKind::Warning),
        }
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        let counters = [
            (self.slots_promoted, "slots promoted"),
            (self.phis_inserted, "phis inserted"),
            (self.instructions_removed, "instructions removed"),
            (self.blocks_removed, "blocks removed"),
            (self.functions_removed, "functions removed"),
            (self.globals_removed, "globals removed"),
            (self.instructions_hoisted, "hoisted"),
            (self.preheaders_created, "preheaders"),
            (self.warnings, "warnings"),
        ];
        for (count, label) in counters {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }
        if parts.is_empty() {
            write!(f, "no transformations ({} passes)", self.passes_run)
        } else {
            write!(f, "{} ({} passes)", parts.join(", "), self.passes_run)
        }
    }
}

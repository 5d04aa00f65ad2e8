//! Engine execution tracing infrastructure.
//!
//! The [`VmTracer`] trait defines hook points at key execution events
//! (instruction dispatch, calls and returns, function and class creation,
//! try blocks, generator suspension). Concrete implementations collect
//! different kinds of data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (default) |
//! | [`StderrTracer`] | Human-readable execution log to stderr |
//! | [`LogTracer`] | Forwards events to the `tracing` ecosystem at `TRACE` level |
//! | [`ProfilingTracer`] | Opcode frequency counters and call depth tracking |
//! | [`RecordingTracer`] | Full event recording for post-mortem analysis |
//!
//! # Usage
//!
//! ```
//! use ember::{Runtime, tracer::ProfilingTracer};
//!
//! let runtime = Runtime::new().unwrap().with_tracer(Box::new(ProfilingTracer::new()));
//! // ... execute code ...
//! let report = runtime.tracer::<ProfilingTracer>().unwrap().report();
//! assert_eq!(report.total_instructions, 0);
//! ```

use std::any::Any;

use ahash::AHashMap;

/// Trace event emitted during execution.
///
/// Used by [`RecordingTracer`] to capture a full execution trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction was dispatched at the given position of its code block.
    Instruction {
        ip: usize,
        opcode: &'static str,
        /// Operand stack depth at the time of dispatch.
        stack_depth: usize,
    },
    /// A function call pushed a new frame.
    Call { func_name: String, depth: usize },
    /// A frame completed and was popped.
    Return { depth: usize },
    /// A function object was created.
    MakeFunction { name: String, defaults_count: usize },
    /// A class was created with the given MRO length.
    MakeClass { name: String, mro_len: usize },
    TryEnter { depth: usize },
    TryExit { depth: usize },
    GeneratorResume { depth: usize },
    GeneratorSuspend { depth: usize },
}

/// Trait for engine execution tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code. Implementations only override the hooks they care about.
///
/// Requires `Any` so hosts can get their concrete tracer back from a
/// [`crate::Runtime`] after execution.
pub trait VmTracer: std::fmt::Debug + Any {
    /// Called before each instruction dispatch in the main execution loop.
    ///
    /// This is the hottest hook. Implementations should be as lightweight as possible.
    ///
    /// # Arguments
    /// * `ip` - Index of the instruction within the executing code block
    /// * `opcode` - Name of the opcode about to be executed
    /// * `stack_depth` - Number of values on the frame's operand stack
    /// * `frame_depth` - Number of active frames
    #[inline(always)]
    fn on_instruction(&mut self, _ip: usize, _opcode: &'static str, _stack_depth: usize, _frame_depth: usize) {}

    /// Called when a function call pushes a new frame.
    #[inline(always)]
    fn on_call(&mut self, _func_name: &str, _depth: usize) {}

    /// Called when a function frame completes.
    ///
    /// # Arguments
    /// * `depth` - Frame depth after the pop
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// Called when a function object is created.
    #[inline(always)]
    fn on_make_function(&mut self, _name: &str, _defaults_count: usize) {}

    /// Called when a class is created, after its MRO is computed.
    #[inline(always)]
    fn on_make_class(&mut self, _name: &str, _mro_len: usize) {}

    /// Called when a try block starts executing.
    #[inline(always)]
    fn on_try_enter(&mut self, _depth: usize) {}

    /// Called when a try block (including its catch and finally) completes.
    #[inline(always)]
    fn on_try_exit(&mut self, _depth: usize) {}

    /// Called when a generator frame is resumed.
    #[inline(always)]
    fn on_generator_resume(&mut self, _depth: usize) {}

    /// Called when a generator frame suspends on a yield.
    #[inline(always)]
    fn on_generator_suspend(&mut self, _depth: usize) {}
}

// ============================================================================
// NoopTracer
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable execution log
// ============================================================================

/// Tracer that prints a human-readable execution log to stderr.
///
/// Output format:
/// ```text
/// [    0] PushInt           stack=0  frames=1
///   >>> CALL foo            depth=2
///   <<< RETURN              depth=1
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of instructions to trace. None = unlimited.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stderr tracer that stops after `limit` instructions.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl VmTracer for StderrTracer {
    #[inline]
    fn on_instruction(&mut self, ip: usize, opcode: &'static str, stack_depth: usize, frame_depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("[{ip:>5}] {opcode:<17} stack={stack_depth}  frames={frame_depth}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} instructions) ---");
            self.stopped = true;
        }
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        if !self.stopped {
            eprintln!("  >>> CALL {func_name:<20} depth={depth}");
        }
    }

    fn on_return(&mut self, depth: usize) {
        if !self.stopped {
            eprintln!("  <<< RETURN              depth={depth}");
        }
    }

    fn on_make_function(&mut self, name: &str, defaults_count: usize) {
        if !self.stopped {
            eprintln!("  +++ MAKE FUNCTION {name} defaults={defaults_count}");
        }
    }

    fn on_make_class(&mut self, name: &str, mro_len: usize) {
        if !self.stopped {
            eprintln!("  +++ MAKE CLASS {name} mro={mro_len}");
        }
    }

    fn on_generator_suspend(&mut self, depth: usize) {
        if !self.stopped {
            eprintln!("  ... YIELD               depth={depth}");
        }
    }
}

// ============================================================================
// LogTracer: events through `tracing`
// ============================================================================

/// Tracer that emits every event as a `tracing` event at `TRACE` level.
///
/// Lets embedders route engine activity through whatever subscriber they
/// already have installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl VmTracer for LogTracer {
    fn on_instruction(&mut self, ip: usize, opcode: &'static str, stack_depth: usize, frame_depth: usize) {
        tracing::trace!(ip, opcode, stack_depth, frame_depth, "instruction");
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        tracing::trace!(func_name, depth, "call");
    }

    fn on_return(&mut self, depth: usize) {
        tracing::trace!(depth, "return");
    }

    fn on_make_function(&mut self, name: &str, defaults_count: usize) {
        tracing::trace!(name, defaults_count, "make function");
    }

    fn on_make_class(&mut self, name: &str, mro_len: usize) {
        tracing::trace!(name, mro_len, "make class");
    }

    fn on_try_enter(&mut self, depth: usize) {
        tracing::trace!(depth, "try enter");
    }

    fn on_try_exit(&mut self, depth: usize) {
        tracing::trace!(depth, "try exit");
    }

    fn on_generator_resume(&mut self, depth: usize) {
        tracing::trace!(depth, "generator resume");
    }

    fn on_generator_suspend(&mut self, depth: usize) {
        tracing::trace!(depth, "generator suspend");
    }
}

// ============================================================================
// ProfilingTracer: opcode frequency and call depth tracking
// ============================================================================

/// Tracer that collects execution statistics.
///
/// Retrieve results via [`ProfilingTracer::report`] after execution.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    opcode_counts: AHashMap<&'static str, u64>,
    total_instructions: u64,
    max_depth: usize,
    total_calls: u64,
    classes_created: u64,
}

/// Summary report from a profiling trace.
#[derive(Debug)]
pub struct ProfilingReport {
    /// Per-opcode execution counts, sorted by frequency (highest first).
    pub opcode_counts: Vec<(&'static str, u64)>,
    pub total_instructions: u64,
    /// Maximum frame depth observed.
    pub max_depth: usize,
    pub total_calls: u64,
    pub classes_created: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a report; opcode counts are sorted by frequency then name.
    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut opcode_counts: Vec<_> = self.opcode_counts.iter().map(|(&k, &v)| (k, v)).collect();
        opcode_counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ProfilingReport {
            opcode_counts,
            total_instructions: self.total_instructions,
            max_depth: self.max_depth,
            total_calls: self.total_calls,
            classes_created: self.classes_created,
        }
    }
}

impl VmTracer for ProfilingTracer {
    #[inline]
    fn on_instruction(&mut self, _ip: usize, opcode: &'static str, _stack_depth: usize, frame_depth: usize) {
        *self.opcode_counts.entry(opcode).or_insert(0) += 1;
        self.total_instructions += 1;
        self.max_depth = self.max_depth.max(frame_depth);
    }

    #[inline]
    fn on_call(&mut self, _func_name: &str, depth: usize) {
        self.total_calls += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn on_make_class(&mut self, _name: &str, _mro_len: usize) {
        self.classes_created += 1;
    }
}

impl std::fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Profiling Report ===")?;
        writeln!(f, "Total instructions: {}", self.total_instructions)?;
        writeln!(f, "Total calls:        {}", self.total_calls)?;
        writeln!(f, "Classes created:    {}", self.classes_created)?;
        writeln!(f, "Max frame depth:    {}", self.max_depth)?;
        writeln!(f)?;
        writeln!(f, "--- Opcode Frequency ---")?;
        for (opcode, count) in &self.opcode_counts {
            let pct = (*count as f64 / self.total_instructions as f64) * 100.0;
            writeln!(f, "  {opcode:<20} {count:>10}  ({pct:>5.1}%)")?;
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTracer: full event recording
// ============================================================================

/// Tracer that records all events in chronological order.
///
/// The most expensive tracer (allocates per event), so use it only for
/// debugging specific issues or recording short executions.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_none_or(|l| self.events.len() < l) {
            self.events.push(event);
        }
    }
}

impl VmTracer for RecordingTracer {
    #[inline]
    fn on_instruction(&mut self, ip: usize, opcode: &'static str, stack_depth: usize, _frame_depth: usize) {
        self.record(TraceEvent::Instruction {
            ip,
            opcode,
            stack_depth,
        });
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        self.record(TraceEvent::Call {
            func_name: func_name.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.record(TraceEvent::Return { depth });
    }

    fn on_make_function(&mut self, name: &str, defaults_count: usize) {
        self.record(TraceEvent::MakeFunction {
            name: name.to_owned(),
            defaults_count,
        });
    }

    fn on_make_class(&mut self, name: &str, mro_len: usize) {
        self.record(TraceEvent::MakeClass {
            name: name.to_owned(),
            mro_len,
        });
    }

    fn on_try_enter(&mut self, depth: usize) {
        self.record(TraceEvent::TryEnter { depth });
    }

    fn on_try_exit(&mut self, depth: usize) {
        self.record(TraceEvent::TryExit { depth });
    }

    fn on_generator_resume(&mut self, depth: usize) {
        self.record(TraceEvent::GeneratorResume { depth });
    }

    fn on_generator_suspend(&mut self, depth: usize) {
        self.record(TraceEvent::GeneratorSuspend { depth });
    }
}

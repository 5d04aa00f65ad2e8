use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::exception_private::{ErrorKind, ExcType, RunError, RuntimeError};

/// Recommended maximum call depth if not otherwise specified.
///
/// Counts function calls, class and block sub-frames, and generator resumes.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 200;

/// Maximum length of the method resolution order computed for any type.
///
/// Limits the output of C3 linearization so adversarial diamond hierarchies
/// cannot consume unbounded memory.
pub const MAX_MRO_LENGTH: usize = 2600;

/// Allocations between automatic garbage collections when no interval is configured.
pub const DEFAULT_GC_INTERVAL: usize = 100_000;

/// Maximum nesting depth when converting runtime values into host [`crate::Object`]s.
pub const MAX_DATA_RECURSION_DEPTH: u16 = 100;

/// Error returned when a resource limit is exceeded during execution.
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// Maximum number of live allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum instruction operations exceeded.
    Operation { limit: usize, count: usize },
    /// Maximum execution time exceeded.
    Time { limit: Duration, elapsed: Duration },
    /// Maximum call depth exceeded.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Operation { limit, count } => {
                write!(f, "operation limit exceeded: {count} > {limit}")
            }
            Self::Time { limit, elapsed } => {
                write!(f, "time limit exceeded: {elapsed:?} > {limit:?}")
            }
            Self::Recursion { limit, .. } => {
                write!(f, "maximum recursion depth exceeded ({limit})")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    /// Maps the limit to the builtin error type raised inside the runtime.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::Allocation { .. } => ExcType::MemoryError,
            Self::Operation { .. } | Self::Time { .. } => ExcType::TimeoutError,
            Self::Recursion { .. } => ExcType::RecursionError,
        }
    }
}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        // Only recursion is catchable: allocation and time limits must reach the host.
        let exc = Box::new(RuntimeError::new(ErrorKind::Builtin(err.exc_type()), err.to_string()));
        if matches!(err, ResourceError::Recursion { .. }) {
            Self::Exc(exc)
        } else {
            Self::Uncatchable(exc)
        }
    }
}

/// Trait for tracking resource usage during execution.
///
/// The heap consults the tracker on every allocation, and the engine calls
/// [`ResourceTracker::check_time`] once per executed instruction and
/// [`ResourceTracker::check_recursion_depth`] before pushing a frame.
pub trait ResourceTracker: fmt::Debug {
    /// Called before each heap allocation.
    fn on_allocate(&mut self) -> Result<(), ResourceError>;

    /// Called when garbage collection frees objects and scopes.
    fn on_free(&mut self, count: usize);

    /// Called before each instruction to check operation and time limits.
    fn check_time(&mut self) -> Result<(), ResourceError>;

    /// Called before pushing a new frame.
    ///
    /// # Arguments
    /// * `current_depth` - Current frame depth (before the new frame is pushed)
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Called when the host starts a new top-level execution.
    ///
    /// Resets per-execution counters such as the operation count and start time.
    fn begin_execution(&mut self) {}

    /// Returns the total number of allocations tracked, if this tracker records them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }

    /// Whether the engine should collect garbage at the next instruction boundary.
    fn should_gc(&self, allocations_since_gc: usize) -> bool {
        allocations_since_gc >= DEFAULT_GC_INTERVAL
    }
}

/// A tracker that only enforces the default recursion depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_free(&mut self, _count: usize) {}

    #[inline]
    fn check_time(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if current_depth >= DEFAULT_MAX_RECURSION_DEPTH {
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_RECURSION_DEPTH,
                depth: current_depth + 1,
            })
        } else {
            Ok(())
        }
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use [`ResourceLimits::new`] for the default recursion limit only, and build
/// custom limits with the builder methods. Serializable so hosts can keep limits
/// in their own configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of executed instructions per execution.
    #[serde(default)]
    pub max_operations: Option<usize>,
    /// Maximum number of heap allocations alive at once.
    ///
    /// Objects and scopes freed by garbage collection no longer count.
    #[serde(default)]
    pub max_allocations: Option<usize>,
    /// Maximum wall-clock execution time.
    #[serde(default)]
    pub max_duration: Option<Duration>,
    /// Maximum frame depth.
    #[serde(default)]
    pub max_recursion_depth: Option<usize>,
    /// Run garbage collection every N allocations.
    #[serde(default)]
    pub gc_interval: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with everything disabled except the default recursion depth.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            ..Default::default()
        }
    }

    /// Sets the maximum number of allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum number of executed instructions.
    #[must_use]
    pub fn max_operations(mut self, limit: usize) -> Self {
        self.max_operations = Some(limit);
        self
    }

    /// Sets the maximum execution duration.
    #[must_use]
    pub fn max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    /// Sets the maximum frame depth, or disables the check with `None`.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    /// Sets the number of allocations between automatic garbage collections.
    #[must_use]
    pub fn gc_interval(mut self, interval: usize) -> Self {
        self.gc_interval = Some(interval);
        self
    }
}

/// A resource tracker that enforces configurable limits.
///
/// Time limits are measured from the last [`ResourceTracker::begin_execution`]
/// call, so a long-lived runtime gets a fresh budget for each execution.
///
/// The allocation limit applies to live allocations. Collection is scheduled
/// at least twice per allocation budget so garbage is reclaimed before the
/// limit is reached.
#[derive(Debug)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    start_time: Instant,
    /// Allocations since the tracker was installed, never decremented.
    allocation_count: usize,
    live_count: usize,
    operation_count: usize,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            start_time: Instant::now(),
            allocation_count: 0,
            live_count: 0,
            operation_count: 0,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Returns the elapsed time since the current execution started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the number of tracked allocations not yet freed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_count
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.live_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.live_count + 1,
            });
        }
        self.allocation_count += 1;
        self.live_count += 1;
        Ok(())
    }

    // Objects allocated before the tracker was installed may be freed too.
    fn on_free(&mut self, count: usize) {
        self.live_count = self.live_count.saturating_sub(count);
    }

    fn check_time(&mut self) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_operations {
            self.operation_count += 1;
            if self.operation_count > max {
                return Err(ResourceError::Operation {
                    limit: max,
                    count: self.operation_count,
                });
            }
        }

        if let Some(max) = self.limits.max_duration {
            let elapsed = self.start_time.elapsed();
            if elapsed > max {
                return Err(ResourceError::Time { limit: max, elapsed });
            }
        }
        Ok(())
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_recursion_depth {
            // current_depth is before push, so new depth would be current_depth + 1
            if current_depth >= max {
                return Err(ResourceError::Recursion {
                    limit: max,
                    depth: current_depth + 1,
                });
            }
        }
        Ok(())
    }

    fn begin_execution(&mut self) {
        self.start_time = Instant::now();
        self.operation_count = 0;
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }

    fn should_gc(&self, allocations_since_gc: usize) -> bool {
        let mut interval = self.limits.gc_interval.unwrap_or(DEFAULT_GC_INTERVAL);
        if let Some(max) = self.limits.max_allocations {
            interval = interval.min((max / 2).max(1));
        }
        allocations_since_gc >= interval
    }
}

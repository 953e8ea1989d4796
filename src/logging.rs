//! Logging configuration and initialization.
//!
//! Maps the requested `--log-level` onto one of two sinks: a human-readable
//! sink for DEBUG/INFO, and a structured JSON sink for WARNING/ERROR. The
//! structured sink is thresholded at WARN and samples repeated error records
//! so a hot failure loop cannot flood the log stream.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::callsite::Identifier;
use tracing::{warn, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Requested verbosity, parsed from the CLI or config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parse a level string. Unrecognized values fall back to INFO.
    pub fn parse(value: &str) -> LogLevel {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Output format of the installed sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    /// Human-readable.
    Pretty,
    /// Human-readable with source locations, for debugging.
    PrettyVerbose,
    /// Machine-parseable JSON.
    Json,
}

/// Minimum level emitted by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Debug,
    Info,
    Warn,
}

impl Threshold {
    fn as_directive(self) -> &'static str {
        match self {
            Threshold::Debug => "debug",
            Threshold::Info => "info",
            Threshold::Warn => "warn",
        }
    }
}

/// Cap on identical error records within a rolling window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPolicy {
    pub window: Duration,
    pub max_per_window: u32,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_per_window: 100,
        }
    }
}

/// The full sink configuration selected for a verbosity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerSettings {
    pub format: SinkFormat,
    pub threshold: Threshold,
    pub sampling: Option<SamplingPolicy>,
    /// Attach source locations to error records on the structured sink.
    pub capture_location: bool,
}

impl LoggerSettings {
    /// Select the sink configuration for a verbosity level.
    ///
    /// This mapping is pure; [`init`] applies it process-wide.
    pub fn for_level(level: LogLevel) -> LoggerSettings {
        match level {
            LogLevel::Debug => LoggerSettings {
                format: SinkFormat::PrettyVerbose,
                threshold: Threshold::Debug,
                sampling: None,
                capture_location: false,
            },
            LogLevel::Info => LoggerSettings {
                format: SinkFormat::Pretty,
                threshold: Threshold::Info,
                sampling: None,
                capture_location: false,
            },
            LogLevel::Warning | LogLevel::Error => LoggerSettings {
                format: SinkFormat::Json,
                threshold: Threshold::Warn,
                sampling: Some(SamplingPolicy::default()),
                capture_location: true,
            },
        }
    }
}

/// Install the process-wide subscriber for the given verbosity level.
///
/// Safe to call more than once; only the first call installs. An explicit
/// `RUST_LOG` takes precedence over the level-derived threshold.
pub fn init(level: LogLevel) {
    let settings = LoggerSettings::for_level(level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.threshold.as_directive()));

    match settings.format {
        SinkFormat::Pretty => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .try_init();
        }
        SinkFormat::PrettyVerbose => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_file(true).with_line_number(true))
                .try_init();
        }
        SinkFormat::Json => {
            let sampling = SamplingLayer::new(settings.sampling.unwrap_or_default());
            let sink = fmt::layer()
                .json()
                .with_file(settings.capture_location)
                .with_line_number(settings.capture_location)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(sampling)
                .with(sink)
                .try_init();
        }
    }
}

/// Outcome of observing one error record against the sampling window.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Emit,
    /// Emit, and report how many identical records the previous window dropped.
    EmitAfterSuppressing(u64),
    Suppress,
}

struct Window {
    started: Instant,
    emitted: u32,
    suppressed: u64,
}

/// Windowed counter of identical records, keyed by originating callsite.
struct ErrorSampler<K: Eq + Hash> {
    policy: SamplingPolicy,
    windows: Mutex<HashMap<K, Window>>,
}

impl<K: Eq + Hash> ErrorSampler<K> {
    fn new(policy: SamplingPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn observe(&self, key: K, now: Instant) -> Verdict {
        let mut windows = self.windows.lock();
        let window = windows.entry(key).or_insert(Window {
            started: now,
            emitted: 0,
            suppressed: 0,
        });

        if now.duration_since(window.started) >= self.policy.window {
            let suppressed = window.suppressed;
            *window = Window {
                started: now,
                emitted: 1,
                suppressed: 0,
            };
            return if suppressed > 0 {
                Verdict::EmitAfterSuppressing(suppressed)
            } else {
                Verdict::Emit
            };
        }

        if window.emitted < self.policy.max_per_window {
            window.emitted += 1;
            Verdict::Emit
        } else {
            window.suppressed += 1;
            Verdict::Suppress
        }
    }
}

/// Layer that suppresses error records past the per-window cap.
pub struct SamplingLayer {
    sampler: ErrorSampler<Identifier>,
}

impl SamplingLayer {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            sampler: ErrorSampler::new(policy),
        }
    }
}

impl<S: Subscriber> Layer<S> for SamplingLayer {
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        if *event.metadata().level() != Level::ERROR {
            return true;
        }
        match self
            .sampler
            .observe(event.metadata().callsite(), Instant::now())
        {
            Verdict::Emit => true,
            Verdict::EmitAfterSuppressing(count) => {
                // Sampler lock is released by now; the summary is WARN level
                // and never re-enters the error path.
                warn!(suppressed = count, "Repeated error records were sampled");
                true
            }
            Verdict::Suppress => false,
        }
    }
}

//! Diagnostic output of the plugin components.
//!
//! Components do not write to the global logger directly: they receive a [`Diagnostics`]
//! when they are built. By default it forwards to the logger installed by the application
//! (see [`log::set_logger`]), but any [`log::Log`] implementation can be plugged in, which
//! is how the tests observe the warnings.

use std::{borrow::Cow, fmt, sync::Arc};

use log::{Level, Log, Metadata, Record};

/// Default log target of the plugin components.
pub const DEFAULT_TARGET: &str = "metrics.plugin";

/// A log sink and a target.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn Log>,
    target: Cow<'static, str>,
}

/// Forwards everything to the global logger.
struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

impl Diagnostics {
    /// Diagnostics that go to the global logger, with the default target.
    pub fn global() -> Self {
        Self::new(Arc::new(GlobalLogger))
    }

    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self {
            sink,
            target: Cow::Borrowed(DEFAULT_TARGET),
        }
    }

    pub fn with_target(mut self, target: impl Into<Cow<'static, str>>) -> Self {
        self.target = target.into();
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(&self.target).build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args)
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args)
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").field("target", &self.target).finish_non_exhaustive()
    }
}

//! Output handling shared by all commands

mod formatter;

pub use formatter::Formatter;

/// Output settings taken from the global command-line flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Emit strict JSON instead of human-readable text
    pub json: bool,
    /// Disable colors
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}

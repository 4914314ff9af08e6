//! Logging.
use once_cell::sync::OnceCell;

static ROOT_LOGGER: OnceCell<slog::Logger> = OnceCell::new();

/// Installs the process root logger.
///
/// Returns `false` if a root logger has already been installed (or a component already requested
/// a logger, which installs the default discarding root logger).
pub fn init_logger(logger: slog::Logger) -> bool {
    ROOT_LOGGER.set(logger).is_ok()
}

/// Returns a logger scoped to the given module.
pub fn get_logger(module: &'static str) -> slog::Logger {
    ROOT_LOGGER
        .get_or_init(|| slog::Logger::root(slog::Discard, slog::o!()))
        .new(slog::o!("module" => module))
}

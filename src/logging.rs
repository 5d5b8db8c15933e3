//! Logger setup.

use std::path::Path;

use crate::error::Result;

/// Installs the global logger.
///
/// Lines look like `[12:34:56.789 INFO glint3d::abs::shader] message` and go to stderr, and
/// also to `file` when one is given.
pub fn setup(level: log::LevelFilter, file: Option<&Path>) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // Image decoders are noisy at debug.
        .level_for("image", log::LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Some(path) = file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    log::debug!("logging at {level}");
    Ok(())
}

use std::error::Error;

use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Returns the log level for the given `-v` count.
///
/// Debug mode implies at least the debug level, otherwise protocol
/// diagnostics would be filtered out.
pub fn level(verbosity: usize, debug: bool) -> LevelFilter {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if debug {
        level.max(LevelFilter::Debug)
    } else {
        level
    }
}

pub fn init(verbosity: usize, debug: bool) -> Result<(), Box<dyn Error>> {
    SimpleLogger::new()
        .with_level(LevelFilter::Off)
        .with_module_level("blaster", level(verbosity, debug))
        .with_utc_timestamps()
        .init()?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level() {
        assert_eq!(LevelFilter::Info, level(0, false));
        assert_eq!(LevelFilter::Debug, level(0, true));
        assert_eq!(LevelFilter::Debug, level(1, false));
        assert_eq!(LevelFilter::Trace, level(2, true));
        assert_eq!(LevelFilter::Trace, level(7, false));
    }
}

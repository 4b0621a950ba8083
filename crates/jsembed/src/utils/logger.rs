use log::Level;
use std::io::Write;

use jsembed_host::CONSOLE_TARGET;

pub fn init_logger(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::Level::Error
    } else if verbose == 0 {
        log::Level::Info
    } else if verbose == 1 {
        log::Level::Debug
    } else {
        log::Level::Trace
    };

    let mut builder = env_logger::builder();

    // `jsembed` prefixes every crate in the workspace, the console target overrides it
    let console_level = if quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Trace
    };

    if level == log::Level::Trace {
        builder.filter_level(level.to_level_filter());
    } else if level == log::Level::Debug {
        builder
            .filter_module("jsembed", level.to_level_filter())
            .filter_module(CONSOLE_TARGET, console_level);
    } else {
        // info, warn, error
        builder
            .filter_module("jsembed", level.to_level_filter())
            .filter_module(CONSOLE_TARGET, console_level)
            .format(|buf, record| {
                if record.level() == Level::Info || record.target() == CONSOLE_TARGET {
                    writeln!(buf, "{}", record.args())
                } else {
                    let log_style = buf.default_level_style(record.level());
                    writeln!(
                        buf,
                        "{log_style}[{}]{log_style:#} {}",
                        record.level(),
                        record.args()
                    )
                }
            });
    }

    let _ = builder.try_init();
}

use std::{env, panic, process};

use backtrace::Backtrace;
use clap::Parser;

use libscenesync::cli::{GlobalOptions, Options};

fn main() {
    install_panic_hook();

    let options = Options::parse();
    init_logging(&options.global);

    if let Err(err) = options.run() {
        log::error!("{:?}", err);
        process::exit(1);
    }
}

fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<no message>".to_owned());

        log::error!(
            "scenesync {} crashed. This is a bug in scenesync, not in your scenes.",
            env!("CARGO_PKG_VERSION")
        );
        log::error!("Details: {}", message);

        if let Some(location) = panic_info.location() {
            log::error!("in file {} on line {}", location.file(), location.line());
        }

        // The backtrace crate doesn't look at RUST_BACKTRACE by itself.
        let should_backtrace = env::var("RUST_BACKTRACE").map_or(false, |var| var == "1");

        if should_backtrace {
            eprintln!("{:?}", Backtrace::new());
        } else {
            eprintln!("note: run with `RUST_BACKTRACE=1` to display a backtrace.");
        }

        process::exit(1);
    }));
}

fn init_logging(global: &GlobalOptions) {
    let log_filter = match global.verbosity {
        0 => "info",
        1 => "info,libscenesync=debug",
        2 => "info,libscenesync=trace",
        _ => "trace",
    };

    let log_env = env_logger::Env::default().default_filter_or(log_filter);

    env_logger::Builder::from_env(log_env)
        .format_module_path(false)
        .format_timestamp(None)
        // Line up continuation lines with the text after `[ERROR] `
        .format_indent(Some(8))
        .write_style(global.color.into())
        .init();
}

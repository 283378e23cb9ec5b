#![allow(unknown_lints)]

extern crate chrono;
extern crate fern;
extern crate telemeter;

#[macro_use]
extern crate log;

use chrono::Utc;
use std::io;
use std::process;
use telemeter::collectors;
use telemeter::constants;
use telemeter::supervisor::Supervisor;

fn main() {
    let (name, args) = match telemeter::config::parse_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("telemeter: {}", e);
            process::exit(constants::EXIT_CONFIG);
        }
    };

    let level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // stdout carries the metric lines, diagnostics go to stderr.
    let logging = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.module_path().unwrap_or("?"),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply();
    if let Err(e) = logging {
        eprintln!("telemeter: could not set up logging: {}", e);
        process::exit(constants::EXIT_CONFIG);
    }

    info!("telemeter {} - {}", args.version, name);

    let (collector, settings) = match collectors::build(&name, &args) {
        Ok(built) => built,
        Err(e) => {
            error!("[{}] {}", name, e);
            process::exit(constants::EXIT_NO_RESTART);
        }
    };

    let stdout = io::stdout();
    let mut supervisor = Supervisor::new(collector, settings, stdout.lock());
    let exit = supervisor.run();
    info!("{} exiting with {:?}", name, exit);
    process::exit(exit.code());
}

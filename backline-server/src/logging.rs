use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter};

pub fn init_logger() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let time = chrono::Local::now().format("%H:%M:%S");

            out.finish(format_args!(
                "{} {} {} {}",
                time.to_string().bright_black(),
                level_badge(record.level()),
                crate_tag(record.target()),
                message
            ))
        })
        // Our own crates log chattily, everything else only when it matters
        .level(LevelFilter::Warn)
        .level_for("backline_core", LevelFilter::Info)
        .level_for("backline_server", LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .expect("logger applies once")
}

fn crate_tag(target: &str) -> ColoredString {
    let root = target.split("::").next().unwrap_or(target);

    match root {
        "backline_core" => "core".blue().bold(),
        "backline_server" => "server".green().bold(),
        external => external.bright_black(),
    }
}

fn level_badge(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERROR".red().bold(),
        Level::Warn => " WARN".yellow().bold(),
        Level::Info => " INFO".cyan(),
        Level::Debug => "DEBUG".bright_black(),
        Level::Trace => "TRACE".bright_black(),
    }
}

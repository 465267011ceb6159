//! Log formatting and console output
//!
//! Handles:
//! - Colorized tag and level columns
//! - Continuation lines for multi-line messages
//! - Broken pipe handling for piped commands

use super::config::colors_enabled;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str) {
    let colors = colors_enabled();
    let time = Local::now().format("%H:%M:%S%.3f").to_string();

    let prefix = if colors {
        format!(
            "{} [{}] [{}] ",
            time.dimmed(),
            format_tag(tag),
            format_level(level)
        )
    } else {
        format!(
            "{} [{:<tag_w$}] [{:<level_w$}] ",
            time,
            tag.to_plain_string(),
            level.as_str(),
            tag_w = TAG_WIDTH,
            level_w = LEVEL_WIDTH
        )
    };

    let continuation = " ".repeat(time.len() + TAG_WIDTH + LEVEL_WIDTH + 7);
    let mut lines = message.lines();
    let first = lines.next().unwrap_or_default();

    let mut output = format!("{}{}", prefix, first);
    for line in lines {
        output.push('\n');
        output.push_str(&continuation);
        output.push_str(line);
    }

    if level <= LogLevel::Warning {
        print_safe(&mut stderr(), &output);
    } else {
        print_safe(&mut stdout(), &output);
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Hub => label.bright_cyan().bold(),
        LogTag::Registry => label.bright_blue().bold(),
        LogTag::Publish => label.bright_green().bold(),
        LogTag::Broadcast => label.bright_magenta().bold(),
        LogTag::Reporter => label.bright_red().bold(),
        LogTag::Webhook => label.yellow().bold(),
        LogTag::Webserver => label.green().bold(),
        LogTag::Websocket => label.cyan().bold(),
        LogTag::External => label.dimmed(),
        LogTag::Other(_) => label.white().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug => label.purple(),
        LogLevel::Verbose => label.dimmed(),
    }
}

/// Write a line, exiting quietly if the reader went away
fn print_safe<W: Write>(out: &mut W, message: &str) {
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    let _ = out.flush();
}

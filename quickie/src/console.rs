//! User-facing status lines.

use crossterm::style::Stylize;

/// `>> msg` in green, on stdout.
pub fn status(msg: impl AsRef<str>) {
    println!("{}{}", ">> ".green(), msg.as_ref());
}

/// `!! msg` in yellow, on stderr.
pub fn warning(msg: impl AsRef<str>) {
    eprintln!("{}", format!("!! {}", msg.as_ref()).yellow());
}

/// `!! msg` in red, on stderr.
pub fn error(msg: impl AsRef<str>) {
    eprintln!("{}", format!("!! {}", msg.as_ref()).red());
}

/// Announce a condition that ends the invocation. The caller exits.
pub fn fatal(msg: impl AsRef<str>) {
    eprintln!(
        "{}",
        format!("FATAL ERROR: {}... exiting", msg.as_ref()).red()
    );
}

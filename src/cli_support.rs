//! Small helpers shared by the demo binary: hand-rolled `eprintln!` plus `exit` for
//! error reporting, no argument-parsing or prompt crate.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::process::exit;

/// Prints `{bin}: error: {msg}` to stderr and exits with status 1.
pub fn fail<M: fmt::Display>(bin: &str, msg: M) -> ! {
    eprintln!("{bin}: error: {msg}");
    exit(1);
}

/// Prints `prompt`, reads one line from stdin, and returns whether it was `y` or `Y`.
pub fn confirm<P: fmt::Display>(prompt: P) -> bool {
    print!("{prompt}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y")
}

//! `tinyfs`: a demo front-end over the [`tinyfs`] library — parses argv, mounts a
//! volume, runs one subcommand, and reports failures via `cli_support::fail`.
//!
//! Out of scope as functionality to test exhaustively — the engine in `tinyfs::fs` is
//! the thing under test — but present as the ambient CLI surface a tool like this
//! would ship with.

use std::env;
use std::io::{self, BufRead, Write};
use tinyfs::cli_support::{confirm, fail};
use tinyfs::fs::{DEFAULT_DISK_NAME, DEFAULT_DISK_SIZE};
use tinyfs::TinyFs;

const BIN: &str = "tinyfs";

fn main() {
    let mut args = env::args_os().skip(1);
    match args.next().and_then(|a| a.into_string().ok()) {
        Some(cmd) if cmd == "mkfs" => cmd_mkfs(args),
        Some(cmd) if cmd == "shell" => cmd_shell(args),
        Some(cmd) if cmd == "readdir" => cmd_readdir(args),
        Some(cmd) if cmd == "info" => cmd_info(args),
        _ => usage(),
    }
}

fn usage() -> ! {
    eprintln!(
        "usage: {BIN} mkfs <path> [size-in-bytes]\n       \
         {BIN} shell <path>\n       \
         {BIN} readdir <path>\n       \
         {BIN} info <path> <name>"
    );
    std::process::exit(1);
}

fn next_str(args: &mut impl Iterator<Item = std::ffi::OsString>) -> Option<String> {
    args.next().and_then(|a| a.into_string().ok())
}

fn cmd_mkfs(mut args: impl Iterator<Item = std::ffi::OsString>) {
    let path = next_str(&mut args).unwrap_or_else(|| DEFAULT_DISK_NAME.to_string());
    let size = next_str(&mut args)
        .map(|s| s.parse::<u64>().unwrap_or_else(|_| fail(BIN, "invalid size")))
        .unwrap_or(DEFAULT_DISK_SIZE);

    if std::path::Path::new(&path).exists() && !confirm(format!("{path} already exists. Overwrite? (y/N) ")) {
        eprintln!("Abort.");
        std::process::exit(1);
    }

    let mut fs = TinyFs::new();
    fs.set_verbose(true);
    fs.mkfs(&path, size).unwrap_or_else(|e| fail(BIN, e));
    println!("formatted {path} ({size} bytes)");
}

fn cmd_readdir(mut args: impl Iterator<Item = std::ffi::OsString>) {
    let path = next_str(&mut args).unwrap_or_else(|| fail(BIN, "specify a volume path"));
    let mut fs = TinyFs::new();
    fs.set_verbose(true);
    fs.mount(&path).unwrap_or_else(|e| fail(BIN, e));
    if let Err(e) = fs.readdir() {
        fail(BIN, e);
    }
    fs.unmount().unwrap_or_else(|e| fail(BIN, e));
}

fn cmd_info(mut args: impl Iterator<Item = std::ffi::OsString>) {
    let path = next_str(&mut args).unwrap_or_else(|| fail(BIN, "specify a volume path"));
    let name = next_str(&mut args).unwrap_or_else(|| fail(BIN, "specify a file name"));
    let mut fs = TinyFs::new();
    fs.set_verbose(true);
    fs.mount(&path).unwrap_or_else(|e| fail(BIN, e));

    // `read_file_info` needs an open descriptor; opening an existing file by name
    // never touches its content, only its access timestamp.
    let fd = fs.open_file(&name).unwrap_or_else(|e| fail(BIN, e));
    if let Err(e) = fs.read_file_info(fd) {
        fail(BIN, e);
    }
    let _ = fs.close_file(fd);
    fs.unmount().unwrap_or_else(|e| fail(BIN, e));
}

fn cmd_shell(mut args: impl Iterator<Item = std::ffi::OsString>) {
    let path = next_str(&mut args).unwrap_or_else(|| fail(BIN, "specify a volume path"));
    let mut fs = TinyFs::new();
    fs.set_verbose(true);
    fs.mount(&path).unwrap_or_else(|e| fail(BIN, e));

    let mut current = None;
    let stdin = io::stdin();
    print!("tinyfs> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let mut words = line.split_whitespace();
        match words.next() {
            Some("open") => match words.next() {
                Some(name) => match fs.open_file(name) {
                    Ok(fd) => current = Some(fd),
                    Err(e) => eprintln!("{e}"),
                },
                None => eprintln!("usage: open <name>"),
            },
            Some("write") => {
                let rest: String = words.collect::<Vec<_>>().join(" ");
                run_on_current(current, |fd| fs.write_file(fd, rest.as_bytes()));
            }
            Some("read") => {
                let n: usize = words.next().and_then(|s| s.parse().ok()).unwrap_or(1);
                if let Some(fd) = current {
                    let mut out = Vec::new();
                    for _ in 0..n {
                        match fs.read_byte(fd) {
                            Ok(b) => out.push(b),
                            Err(e) => {
                                eprintln!("{e}");
                                break;
                            }
                        }
                    }
                    println!("{}", String::from_utf8_lossy(&out));
                } else {
                    eprintln!("no file open");
                }
            }
            Some("seek") => {
                let off: u64 = words.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                run_on_current(current, |fd| fs.seek(fd, off));
            }
            Some("rm") => {
                if let Some(fd) = current.take() {
                    if let Err(e) = fs.delete_file(fd) {
                        eprintln!("{e}");
                    }
                } else {
                    eprintln!("no file open");
                }
            }
            Some("rename") => {
                let new_name = words.next().unwrap_or("");
                run_on_current(current, |fd| fs.rename(fd, new_name));
            }
            Some("info") => {
                if let Some(fd) = current {
                    if let Err(e) = fs.read_file_info(fd) {
                        eprintln!("{e}");
                    }
                } else {
                    eprintln!("no file open");
                }
            }
            Some("ls") => {
                if let Err(e) = fs.readdir() {
                    eprintln!("{e}");
                }
            }
            Some("quit") | Some("exit") => break,
            Some(other) => eprintln!("unknown command: {other}"),
            None => {}
        }
        print!("tinyfs> ");
        let _ = io::stdout().flush();
    }

    if let Some(fd) = current {
        let _ = fs.close_file(fd);
    }
    let _ = fs.unmount();
}

fn run_on_current<F>(current: Option<tinyfs::fs::Fd>, f: F)
where
    F: FnOnce(tinyfs::fs::Fd) -> tinyfs::Result<()>,
{
    match current {
        Some(fd) => {
            if let Err(e) = f(fd) {
                eprintln!("{e}");
            }
        }
        None => eprintln!("no file open"),
    }
}

// ffbar-cli/src/main.rs
//
// Defines the command-line surface of ffbar. Every argument is captured
// verbatim (including hyphenated ffmpeg flags) and forwarded to the
// child unchanged; the wrapper's exit code is the child's exit code.
//
// Exit codes: child's own code on a normal run, 130 when interrupted,
// 1 when ffmpeg could not be started or an internal error surfaced.

use clap::Parser;
use ffbar_core::Runner;
use std::ffi::OsString;
use std::process;

#[derive(Parser, Debug)]
#[command(
    name = "ffbar",
    about = "Terminal progress bar wrapper around ffmpeg",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Arguments forwarded unchanged to ffmpeg
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "FFMPEG_ARGS"
    )]
    args: Vec<OsString>,
}

fn print_usage() {
    println!("ffbar {}", env!("CARGO_PKG_VERSION"));
    println!("Terminal progress bar wrapper around ffmpeg.");
    println!();
    println!("USAGE:");
    println!("    ffbar <FFMPEG_ARGS>...");
    println!();
    println!("All arguments are passed to ffmpeg unchanged; ffbar replaces the");
    println!("usual log wall with a single live progress line and forwards your");
    println!("keystrokes (e.g. 'q', or answers to overwrite prompts) to ffmpeg.");
    println!("ffbar exits with ffmpeg's own exit code.");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if cli.args.is_empty() {
        print_usage();
        return;
    }

    log::debug!("forwarding {} argument(s) to ffmpeg", cli.args.len());
    match Runner::new(cli.args).run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("ffbar: {err}");
            process::exit(1);
        }
    }
}

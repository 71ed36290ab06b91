//! Child process supervision.
//!
//! Spawns the ffmpeg child, pumps its stderr byte-by-byte through the
//! line accumulator and progress state, forwards host keystrokes to its
//! stdin from a second thread, and propagates its exit status. An
//! interrupt (Ctrl-C) terminates the whole process immediately with the
//! conventional 130 exit code, skipping the normal teardown.

use std::env;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::line::{LineAccumulator, LineEvent};
use crate::render::BarCell;
use crate::state::ProgressState;

/// Environment variable overriding the spawned binary (default `ffmpeg`).
pub const FFMPEG_ENV: &str = "FFBAR_FFMPEG";

/// Poll interval for the keystroke-forwarding loop. Must stay short
/// enough that keystroke echo feels immediate.
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Pause before re-reading stderr after end-of-stream with the child
/// still alive.
const STDERR_RETRY_PAUSE: Duration = Duration::from_millis(30);
/// Grace period for the stdin pump to stop after child exit. Expiry is
/// best-effort cleanup, not an error.
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const DRAIN_SLICE: Duration = Duration::from_millis(20);

static SIGNAL_WATCH: Once = Once::new();

/// Supervises one ffmpeg run: `Runner::new(args).run()` spawns the
/// child, renders progress from its stderr, and returns its exit code.
pub struct Runner {
    program: OsString,
    args: Vec<OsString>,
    bar: Arc<BarCell>,
    forward_keys: bool,
}

impl Runner {
    /// Runner for the binary named by `FFBAR_FFMPEG` (default `ffmpeg`)
    /// with keystroke forwarding enabled and the bar on stderr.
    pub fn new(args: Vec<OsString>) -> Self {
        let program = env::var_os(FFMPEG_ENV).unwrap_or_else(|| OsString::from("ffmpeg"));
        Self {
            program,
            args,
            bar: Arc::new(BarCell::stderr()),
            forward_keys: true,
        }
    }

    /// Overrides the spawned program.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Replaces the progress bar cell (tests inject an in-memory sink).
    pub fn with_bar(mut self, bar: Arc<BarCell>) -> Self {
        self.bar = bar;
        self
    }

    /// Disables host keystroke forwarding.
    pub fn without_keys(mut self) -> Self {
        self.forward_keys = false;
        self
    }

    /// Runs the child to completion and returns its exit code. The
    /// argument list is forwarded unchanged, with no shell involved.
    pub fn run(self) -> CoreResult<i32> {
        install_signal_watch();

        let program_name = self.program.to_string_lossy().into_owned();
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(|source| CoreError::SpawnFailed {
            program: program_name.clone(),
            source,
        })?;
        debug!("spawned {program_name} (pid {})", child.id());

        let stderr = child.stderr.take().ok_or(CoreError::MissingPipe {
            program: program_name.clone(),
            stream: "stderr",
        })?;
        let stdin = child.stdin.take().ok_or(CoreError::MissingPipe {
            program: program_name.clone(),
            stream: "stdin",
        })?;

        let child_exited = Arc::new(AtomicBool::new(false));
        let pump_stopped = Arc::new(AtomicBool::new(false));
        let stdin_pump = self.forward_keys.then(|| {
            spawn_stdin_pump(stdin, child_exited.clone(), pump_stopped.clone())
        });

        let last_line = self.pump_stderr(stderr, &mut child);

        // Teardown runs on every path out of the pump: finalize the bar
        // exactly once, then let the stdin pump wind down.
        self.bar.close();
        child_exited.store(true, Ordering::SeqCst);
        if let Some(handle) = stdin_pump {
            drain_stdin_pump(handle, &pump_stopped);
        }

        let status = child.wait().map_err(|source| CoreError::WaitFailed {
            program: program_name.clone(),
            source,
        })?;
        let code = exit_code(&status);
        debug!("{program_name} exited with {status}");

        if code != 0 {
            if let Some(line) = last_line {
                let mut err = io::stderr();
                let _ = writeln!(err, "{line}");
                let _ = err.flush();
            }
        }
        Ok(code)
    }

    /// Single consumer of the child's stderr: bytes are processed in
    /// strict arrival order. Returns the last completed diagnostic line.
    fn pump_stderr(&self, mut stderr: impl Read, child: &mut Child) -> Option<String> {
        let mut accumulator = LineAccumulator::new();
        let mut state = ProgressState::new(self.bar.clone());
        let mut byte = [0u8; 1];
        loop {
            match stderr.read(&mut byte) {
                Ok(0) => match child.try_wait() {
                    Ok(None) => thread::sleep(STDERR_RETRY_PAUSE),
                    _ => break,
                },
                Ok(_) => match accumulator.push(byte[0]) {
                    LineEvent::Pending => {}
                    LineEvent::Completed(line) => state.observe_line(&line),
                    LineEvent::Prompt(prompt) => {
                        write_prompt(&mut io::stderr(), self.bar.line_active(), &prompt);
                        state.observe_line(&prompt);
                    }
                },
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!("stderr read failed: {err}");
                    break;
                }
            }
        }
        accumulator.last_line().map(str::to_string)
    }
}

/// Passes a detected confirmation prompt through verbatim. A progress
/// line still on screen gets terminated first so the next repaint does
/// not overwrite the prompt.
fn write_prompt(out: &mut dyn Write, bar_on_screen: bool, prompt: &str) {
    if bar_on_screen {
        let _ = writeln!(out);
    }
    let _ = write!(out, "{prompt}");
    let _ = out.flush();
}

/// Forwards host keystrokes to the child's stdin until `child_exited`
/// is set. Every failure inside an iteration is swallowed: keystroke
/// forwarding is a best-effort side channel and must never disturb the
/// supervising flow.
fn spawn_stdin_pump(
    mut stdin: ChildStdin,
    child_exited: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !child_exited.load(Ordering::SeqCst) {
            match event::poll(KEY_POLL_INTERVAL) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if let Some(byte) = key_byte(key.code) {
                            echo_key(byte);
                            let _ = stdin.write_all(&[byte]).and_then(|()| stdin.flush());
                        }
                    }
                }
                Ok(false) => {}
                // No usable event source (e.g. no tty); keep the loop
                // responsive to shutdown without spinning.
                Err(_) => thread::sleep(KEY_POLL_INTERVAL),
            }
        }
        stopped.store(true, Ordering::SeqCst);
    })
}

/// Waits up to the drain grace period for the stdin pump to notice the
/// stop flag. A pump still mid-poll at expiry is detached, not an error.
fn drain_stdin_pump(handle: thread::JoinHandle<()>, stopped: &AtomicBool) {
    let mut waited = Duration::ZERO;
    while waited < DRAIN_GRACE && !stopped.load(Ordering::SeqCst) {
        thread::sleep(DRAIN_SLICE);
        waited += DRAIN_SLICE;
    }
    if stopped.load(Ordering::SeqCst) {
        let _ = handle.join();
    } else {
        debug!("stdin pump still draining at exit; detaching");
    }
}

fn key_byte(code: KeyCode) -> Option<u8> {
    match code {
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        _ => None,
    }
}

fn echo_key(byte: u8) {
    let mut err = io::stderr();
    let _ = err.write_all(&[byte]);
    let _ = err.flush();
}

/// Maps a child exit status to the wrapper's exit code: the child's own
/// code when it has one, `128 + signal` for a signal-killed child.
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Installs the process-wide interrupt handler once. An interrupt exits
/// immediately with 130, skipping the drain and the bar teardown: the
/// user asked to abort.
fn install_signal_watch() {
    SIGNAL_WATCH.call_once(|| {
        if let Err(err) = ctrlc::set_handler(|| {
            let mut out = io::stderr();
            let _ = writeln!(out, "\nffbar: interrupted, exiting");
            let _ = out.flush();
            std::process::exit(130);
        }) {
            warn!("could not install interrupt handler: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bytes_translate_enter_and_ascii() {
        assert_eq!(key_byte(KeyCode::Enter), Some(b'\n'));
        assert_eq!(key_byte(KeyCode::Char('q')), Some(b'q'));
        assert_eq!(key_byte(KeyCode::Char('y')), Some(b'y'));
        assert_eq!(key_byte(KeyCode::Esc), None);
        assert_eq!(key_byte(KeyCode::Char('é')), None);
    }

    #[test]
    fn prompt_passthrough_terminates_an_active_bar_line() {
        let mut out = Vec::new();
        write_prompt(&mut out, true, "Overwrite? [y/N] ");
        assert_eq!(out, b"\nOverwrite? [y/N] ");

        let mut out = Vec::new();
        write_prompt(&mut out, false, "Overwrite? [y/N] ");
        assert_eq!(out, b"Overwrite? [y/N] ");
    }

    #[cfg(unix)]
    #[test]
    fn signal_exit_codes_follow_the_128_convention() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(&ExitStatus::from_raw(0)), 0);
        // Raw wait status 9: killed by SIGKILL.
        assert_eq!(exit_code(&ExitStatus::from_raw(9)), 137);
        // Raw wait status 0x0200: exited with code 2.
        assert_eq!(exit_code(&ExitStatus::from_raw(0x0200)), 2);
    }
}

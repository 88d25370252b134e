//! External typesetting and conversion programs.

use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// One program run: argument vector, working directory and time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: &str, cwd: &Path, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when killed by a signal or the timeout.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out
    }

    /// Combined output, trimmed to the last `max_lines` lines.
    pub fn log_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }

    pub fn describe_failure(&self) -> String {
        if self.timed_out {
            "timed out".to_string()
        } else {
            match self.status {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        }
    }
}

/// Runs external programs. Tests substitute a scripted implementation.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        tracing::debug!(command = %invocation.command_line(), cwd = %invocation.cwd.display(), "running tool");
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let (status, timed_out) = loop {
            if let Some(status) = child.try_wait()? {
                break (status.code(), false);
            }
            if started.elapsed() >= invocation.timeout {
                tracing::warn!(program = %invocation.program, timeout = ?invocation.timeout, "tool timed out; killing");
                let _ = child.kill();
                let _ = child.wait();
                break (None, true);
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ProcessOutput {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            timed_out,
        })
    }
}

/// Program names of every external tool, plus the per-run time limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    pub latex: String,
    pub pdflatex: String,
    pub dvips: String,
    pub ps2pdf: String,
    pub pdftops: String,
    pub gs: String,
    pub timeout_secs: u64,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            latex: "latex".to_string(),
            pdflatex: "pdflatex".to_string(),
            dvips: "dvips".to_string(),
            ps2pdf: "ps2pdf".to_string(),
            pdftops: "pdftops".to_string(),
            gs: "gs".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Toolchain {
    /// Defaults overridden by `FIGTEX_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut tc = Self::default();
        let programs = [
            ("FIGTEX_LATEX", &mut tc.latex),
            ("FIGTEX_PDFLATEX", &mut tc.pdflatex),
            ("FIGTEX_DVIPS", &mut tc.dvips),
            ("FIGTEX_PS2PDF", &mut tc.ps2pdf),
            ("FIGTEX_PDFTOPS", &mut tc.pdftops),
            ("FIGTEX_GS", &mut tc.gs),
        ];
        for (key, slot) in programs {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
        if let Some(raw) = lookup("FIGTEX_TOOL_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => tc.timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "ignoring invalid FIGTEX_TOOL_TIMEOUT_SECS"),
            }
        }
        tc
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

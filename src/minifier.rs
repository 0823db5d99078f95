//! The external minifier seam.
//!
//! The engine only knows the [`Minifier`] trait. [`CommandMinifier`] runs a real tool using the
//! `<tool> <input> -o <output>` convention (e.g. the YUI compressor); tests substitute fakes.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::{PipelineError, PipelineResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Why a minifier invocation did not produce output.
#[derive(Debug, Error)]
pub enum MinifierError {
  /// The tool ran and exited unsuccessfully.
  #[error("exit status {}:\n{output}", describe_status(status))]
  Failed {
    /// Exit code, absent when the process was killed by a signal.
    status: Option<i32>,
    /// Captured stdout followed by stderr.
    output: String,
  },
  /// The tool did not finish in time and was killed.
  #[error("timed out after {}s:\n{output}", timeout.as_secs())]
  TimedOut {
    /// Configured limit.
    timeout: Duration,
    /// Whatever the tool printed before it was killed.
    output: String,
  },
  /// The tool could not be started or waited on.
  #[error("unable to run '{program}': {source}")]
  Spawn {
    /// Program that was executed.
    program: String,
    /// Underlying I/O error.
    #[source]
    source: io::Error,
  },
}

/// Produces a minified copy of an asset.
pub trait Minifier {
  /// Minify `input` into `output`.
  fn minify(&self, input: &Path, output: &Path) -> Result<(), MinifierError>;
}

/// Runs an external command as `<command...> <input> -o <output>`.
#[derive(Debug, Clone)]
pub struct CommandMinifier {
  program: String,
  args: Vec<String>,
  timeout: Option<Duration>,
}

impl CommandMinifier {
  /// Build from a command prefix such as `["java", "-jar", "yuicompressor.jar"]`.
  pub fn new(command: &[String], timeout: Option<Duration>) -> PipelineResult<Self> {
    let Some((program, args)) = command.split_first() else {
      return Err(PipelineError::configuration("no minifier command configured"));
    };
    Ok(Self {
      program: program.clone(),
      args: args.to_vec(),
      timeout,
    })
  }
}

impl Minifier for CommandMinifier {
  fn minify(&self, input: &Path, output: &Path) -> Result<(), MinifierError> {
    let spawn_error = |source: io::Error| MinifierError::Spawn {
      program: self.program.clone(),
      source,
    };

    let mut child = Command::new(&self.program)
      .args(&self.args)
      .arg(input)
      .arg("-o")
      .arg(output)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(spawn_error)?;

    // Both pipes are drained while waiting, otherwise a chatty tool blocks on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let waited = wait_with_timeout(&mut child, self.timeout);
    if waited.is_err() {
      let _ = child.kill();
    }
    let captured = capture_lines(&collect(stdout), &collect(stderr));

    match waited.map_err(spawn_error)? {
      None => Err(MinifierError::TimedOut {
        timeout: self.timeout.unwrap_or_default(),
        output: captured,
      }),
      Some(status) if !status.success() => Err(MinifierError::Failed {
        status: status.code(),
        output: captured,
      }),
      Some(_) => Ok(()),
    }
  }
}

/// Wait for `child`, killing it once `timeout` elapses. `None` means it was killed.
fn wait_with_timeout(
  child: &mut Child,
  timeout: Option<Duration>,
) -> io::Result<Option<ExitStatus>> {
  let Some(timeout) = timeout else {
    return child.wait().map(Some);
  };

  let start = Instant::now();
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    if start.elapsed() > timeout {
      let _ = child.kill();
      child.wait()?;
      return Ok(None);
    }
    thread::sleep(POLL_INTERVAL);
  }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
  pipe.map(|mut pipe| {
    thread::spawn(move || {
      let mut buffer = Vec::new();
      let _ = pipe.read_to_end(&mut buffer);
      buffer
    })
  })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
  reader
    .and_then(|handle| handle.join().ok())
    .unwrap_or_default()
}

fn describe_status(status: &Option<i32>) -> String {
  match status {
    Some(code) => code.to_string(),
    None => "unknown".to_string(),
  }
}

fn capture_lines(stdout: &[u8], stderr: &[u8]) -> String {
  let mut message = String::new();
  for stream in [stdout, stderr] {
    for line in String::from_utf8_lossy(stream).lines() {
      message.push_str(line);
      message.push('\n');
    }
  }
  message
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_command_is_a_configuration_error() {
    let error = CommandMinifier::new(&[], None).unwrap_err();
    assert!(matches!(error, PipelineError::Configuration { .. }));
  }

  #[test]
  fn captures_both_streams_line_by_line() {
    let message = capture_lines(b"first\nsecond", b"oops\n");
    assert_eq!(message, "first\nsecond\noops\n");
  }

  #[test]
  fn missing_program_reports_spawn_failure() {
    let minifier =
      CommandMinifier::new(&["definitely-not-a-real-minifier".to_string()], None).unwrap();
    let error = minifier
      .minify(Path::new("in.js"), Path::new("out.js"))
      .unwrap_err();
    assert!(matches!(error, MinifierError::Spawn { .. }));
  }

  #[cfg(unix)]
  #[test]
  fn non_zero_exit_carries_tool_output() {
    let command = vec![
      "sh".to_string(),
      "-c".to_string(),
      "echo \"syntax error in $0\" >&2; exit 3".to_string(),
    ];
    let minifier = CommandMinifier::new(&command, Some(Duration::from_secs(30))).unwrap();
    let error = minifier
      .minify(Path::new("broken.js"), Path::new("broken.js.tmp"))
      .unwrap_err();

    match error {
      MinifierError::Failed { status, output } => {
        assert_eq!(status, Some(3));
        assert!(output.contains("syntax error in broken.js"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[cfg(unix)]
  #[test]
  fn verbose_tool_that_succeeds_is_not_timed_out() {
    let command = vec![
      "sh".to_string(),
      "-c".to_string(),
      "head -c 200000 /dev/zero | tr '\\0' x >&2; exit 0".to_string(),
    ];
    let minifier = CommandMinifier::new(&command, Some(Duration::from_secs(20))).unwrap();
    let started = Instant::now();

    minifier
      .minify(Path::new("big.js"), Path::new("big.js.tmp"))
      .unwrap();

    assert!(started.elapsed() < Duration::from_secs(20));
  }

  #[cfg(unix)]
  #[test]
  fn verbose_failure_keeps_the_full_output() {
    let command = vec![
      "sh".to_string(),
      "-c".to_string(),
      "head -c 100000 /dev/zero | tr '\\0' w; echo; echo fatal >&2; exit 2".to_string(),
    ];
    let minifier = CommandMinifier::new(&command, Some(Duration::from_secs(20))).unwrap();

    let error = minifier
      .minify(Path::new("big.js"), Path::new("big.js.tmp"))
      .unwrap_err();

    match error {
      MinifierError::Failed { status, output } => {
        assert_eq!(status, Some(2));
        assert!(output.starts_with(&"w".repeat(100_000)));
        assert!(output.ends_with("fatal\n"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[cfg(unix)]
  #[test]
  fn hung_tool_is_killed_after_timeout() {
    let command = vec!["sh".to_string(), "-c".to_string(), "exec sleep 5".to_string()];
    let minifier = CommandMinifier::new(&command, Some(Duration::from_millis(100))).unwrap();
    let error = minifier
      .minify(Path::new("a.js"), Path::new("a.js.tmp"))
      .unwrap_err();
    assert!(matches!(error, MinifierError::TimedOut { .. }));
  }
}

//! Run external commands on behalf of a task
//!
//! Output is streamed line by line while the command runs. stdout and stderr
//! are each drained by their own thread so neither pipe can fill up and
//! stall the child, and the call only returns once the child has exited and
//! both streams are fully written.

use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;

use stepkit::{Result, TaskError};

/// Resolve `program` in PATH
pub fn find_program(task: &str, program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|e| TaskError::Spawn {
        task: task.to_string(),
        command: program.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
    })
}

/// Run `cmd`, streaming its output to this process's stdout and stderr
pub fn run(task: &str, cmd: Command) -> Result<()> {
    run_streamed(task, cmd, io::stdout(), io::stderr())
}

/// Run `cmd`, writing each output line as `[<task>] [<stream>] <line>`
///
/// Whitespace-only lines are dropped. Ordering within one stream is kept;
/// the two streams interleave freely.
pub fn run_streamed<O, E>(task: &str, mut cmd: Command, stdout: O, stderr: E) -> Result<()>
where
    O: Write + Send,
    E: Write + Send,
{
    let command = describe(&cmd);
    log::debug!("[{task}] running {command}");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TaskError::Spawn {
            task: task.to_string(),
            command: command.clone(),
            source,
        })?;

    let Some(out_pipe) = child.stdout.take() else {
        reap(&mut child);
        return Err(pipe_error(task, "stdout"));
    };
    let Some(err_pipe) = child.stderr.take() else {
        reap(&mut child);
        return Err(pipe_error(task, "stderr"));
    };

    let status = thread::scope(|s| {
        let out = s.spawn(move || pump(task, "stdout", out_pipe, stdout));
        let err = s.spawn(move || pump(task, "stderr", err_pipe, stderr));

        let status = child.wait();

        for (stream, reader) in [("stdout", out), ("stderr", err)] {
            if reader.join().is_err() {
                log::warn!("[{task}] {stream} reader panicked");
            }
        }

        status
    })
    .map_err(|source| TaskError::Spawn {
        task: task.to_string(),
        command: command.clone(),
        source,
    })?;

    if !status.success() {
        return Err(TaskError::ProcessFailed {
            task: task.to_string(),
            command,
            status,
        });
    }

    Ok(())
}

/// Copy lines from `pipe` to `out` until EOF
///
/// A line ends at `\n` or `\r`, so carriage-return progress output (such as
/// `git clone --progress`) is forwarded as it arrives. Keeps draining after a
/// write failure so the child never blocks on a full pipe.
fn pump<R: Read, W: Write>(task: &str, stream: &str, pipe: R, mut out: W) {
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    let mut writable = true;

    loop {
        line.clear();
        match read_segment(&mut reader, &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if !writable || line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                if let Err(e) = out
                    .write_all(&format_line(task, stream, &line))
                    .and_then(|()| out.flush())
                {
                    log::warn!("[{task}] dropping {stream} output: {e}");
                    writable = false;
                }
            }
            Err(e) => {
                if writable {
                    let _ = writeln!(out, "[{task}] [{stream}] error: {e}");
                }
                break;
            }
        }
    }

    let _ = out.flush();
}

/// Read up to and including the next `\n` or `\r`
fn read_segment<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut read = 0;

    loop {
        let (done, used) = {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            match available.iter().position(|&b| matches!(b, b'\n' | b'\r')) {
                Some(i) => {
                    buf.extend_from_slice(&available[..=i]);
                    (true, i + 1)
                }
                None => {
                    buf.extend_from_slice(available);
                    (available.is_empty(), available.len())
                }
            }
        };

        reader.consume(used);
        read += used;

        if done {
            return Ok(read);
        }
    }
}

fn format_line(task: &str, stream: &str, line: &[u8]) -> Vec<u8> {
    let prefix = format!("[{task}] [{stream}] ");
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let mut buf = Vec::with_capacity(prefix.len() + line.len() + 1);
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(line);
    buf.push(b'\n');
    buf
}

fn pipe_error(task: &str, stream: &'static str) -> TaskError {
    TaskError::Pipe {
        task: task.to_string(),
        stream,
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Render a command line for logs and errors
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

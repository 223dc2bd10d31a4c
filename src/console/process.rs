//! Child server process wrapper.
//!
//! Spawns the configured server command, publishes each stdout line to a
//! `LineHub` from a dedicated reader thread, and accepts console commands on
//! the child's stdin.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use super::{parse_server_line, CommandSink, LineHub};
use crate::error::ConsoleError;

pub struct ServerProcess {
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    reader: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ServerProcess {
    /// Launch `command` in `working_dir` and start relaying its output.
    ///
    /// Every raw line is echoed to this process's stdout so the operator
    /// still sees the server console.
    pub fn spawn(command: &[String], working_dir: &Path, hub: LineHub) -> Result<Self, ConsoleError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ConsoleError::Spawn("server_command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| ConsoleError::Spawn(format!("{}: {}", program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConsoleError::Spawn("server stdout was not captured".to_string()))?;
        let stdin = child.stdin.take();

        let reader = thread::Builder::new()
            .name("server-console-reader".to_string())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for raw in reader.lines() {
                    match raw {
                        Ok(raw) => {
                            println!("{}", raw);
                            hub.publish(parse_server_line(&raw));
                        }
                        Err(e) => {
                            log::warn!("[Console] Read error on server stdout: {}", e);
                            break;
                        }
                    }
                }
                log::info!("[Console] Server stdout closed");
                hub.close();
            })
            .map_err(|e| ConsoleError::Spawn(format!("failed to spawn reader thread: {}", e)))?;

        log::info!("[Console] Started server: {}", command.join(" "));
        Ok(ServerProcess {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.child
            .lock()
            .map(|mut child| matches!(child.try_wait(), Ok(None)))
            .unwrap_or(false)
    }

    /// Ask the server to stop, then kill it if it is still up after `grace`.
    pub fn shutdown(&self, grace: Duration) -> Result<(), ConsoleError> {
        if self.is_running() {
            let _ = self.execute("stop");
        }
        let deadline = Instant::now() + grace;
        {
            let mut child = self
                .child
                .lock()
                .map_err(|e| ConsoleError::Closed(format!("child lock poisoned: {}", e)))?;
            loop {
                if child.try_wait()?.is_some() {
                    break;
                }
                if Instant::now() >= deadline {
                    log::warn!("[Console] Server did not stop within {:?}, killing it", grace);
                    child.kill()?;
                    child.wait()?;
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        }
        if let Ok(mut stdin) = self.stdin.lock() {
            stdin.take();
        }
        if let Some(handle) = self.reader.lock().ok().and_then(|mut r| r.take()) {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl CommandSink for ServerProcess {
    fn execute(&self, command: &str) -> Result<(), ConsoleError> {
        let mut guard = self
            .stdin
            .lock()
            .map_err(|e| ConsoleError::Closed(format!("stdin lock poisoned: {}", e)))?;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| ConsoleError::Closed("server stdin is closed".to_string()))?;
        stdin.write_all(command.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }
}

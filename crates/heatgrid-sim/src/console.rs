//! Operator console: `stop` on stdin or Ctrl-C raises the correlator's stop flag

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorCommand {
    Stop,
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            s if s.eq_ignore_ascii_case("stop") => Some(OperatorCommand::Stop),
            _ => None,
        }
    }
}

/// Start the console; the returned task ends once the stop flag is raised
pub fn spawn(stop: Arc<AtomicBool>) -> JoinHandle<()> {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<OperatorCommand>(4);

    // Blocking stdin reads stay off the runtime; the thread dies with the process
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match OperatorCommand::parse(&line) {
                Some(cmd) => {
                    if cmd_tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                None if !line.trim().is_empty() => warn!(input = %line.trim(), "unknown command, type 'stop'"),
                None => {}
            }
        }
        debug!("operator console input closed");
    });

    tokio::spawn(async move {
        tokio::select! {
            Some(OperatorCommand::Stop) = cmd_rx.recv() => info!("stop requested by operator"),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("interrupted, stopping"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
            },
        }
        stop.store(true, Ordering::Release);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(OperatorCommand::parse("stop\n"), Some(OperatorCommand::Stop));
        assert_eq!(OperatorCommand::parse("  STOP "), Some(OperatorCommand::Stop));
        assert_eq!(OperatorCommand::parse("halt"), None);
        assert_eq!(OperatorCommand::parse(""), None);
    }
}

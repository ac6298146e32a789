use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use agent_chat::{ControllerConfig, SessionRuntime, ThreadController};
use agent_chat_cli::channels;
use agent_chat_cli::logging::init_logging;
use agent_chat_cli::repl::{LineOutcome, Repl};
use agent_stream::SnapshotQueue;
use tracing::info;

const TICK: Duration = Duration::from_millis(50);

fn main() -> io::Result<()> {
    init_logging();

    let config = ControllerConfig::from_env().map_err(io::Error::other)?;
    let queue = SnapshotQueue::new();
    let channel = channels::channel_from_env(queue.clone()).map_err(io::Error::other)?;
    let runtime = SessionRuntime::new(ThreadController::new(config), channel, queue);
    let mut repl = Repl::new(runtime, io::stdout());
    repl.print_banner()?;

    let (lines_tx, lines_rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("agent-chat-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if lines_tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    loop {
        match lines_rx.recv_timeout(TICK) {
            Ok(line) => {
                if repl.handle_line(&line)? == LineOutcome::Quit {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Drain the last turn before exiting on EOF.
                while repl.is_busy() && repl.tick()? {}
                break;
            }
        }
        repl.tick()?;
    }

    info!("session ended");
    Ok(())
}

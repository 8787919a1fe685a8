//! Console debugger driven from stdin
//!
//! Commands while paused:
//!
//! - `c` continue, `s` step over, `i` step into, `o` step out
//! - `v` list the current frame's variables
//! - `p <expr>` evaluate a watch expression
//! - `q` stop the run

use anyhow::Result;
use retro_core::Value;
use retro_debugger::{DebugObserver, Debugger, PauseReason};
use retro_runner::{RunResult, RunSession};
use retro_script::Location;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

enum ConsoleEvent {
    Paused { reason: PauseReason, location: Location },
    Finished(RunResult<Value>),
}

struct ConsoleObserver {
    events: mpsc::UnboundedSender<ConsoleEvent>,
}

impl DebugObserver for ConsoleObserver {
    fn on_paused(&self, reason: PauseReason, location: &Location) {
        let _ = self.events.send(ConsoleEvent::Paused {
            reason,
            location: location.clone(),
        });
    }
}

/// What the prompt loop decided
enum Resume {
    Resumed,
    Quit,
}

/// Run the session on a worker thread and serve debugger pauses on this one
pub fn run_with_console(session: Arc<RunSession>, debugger: Arc<Debugger>) -> Result<RunResult<Value>> {
    let (events, mut rx) = mpsc::unbounded_channel();
    debugger.add_observer(Arc::new(ConsoleObserver {
        events: events.clone(),
    }));

    let worker = session.clone();
    let handle = thread::Builder::new()
        .name("script".to_string())
        .spawn(move || {
            let _ = events.send(ConsoleEvent::Finished(worker.run()));
        })?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let result = loop {
        match rx.blocking_recv() {
            Some(ConsoleEvent::Paused { reason, location }) => {
                println!("paused at {} ({})", location, reason);
                if let Resume::Quit = prompt(&debugger, &mut lines)? {
                    session.stop();
                }
            }
            Some(ConsoleEvent::Finished(result)) => break result,
            None => anyhow::bail!("script thread exited without a result"),
        }
    };

    if handle.join().is_err() {
        anyhow::bail!("script thread panicked");
    }
    Ok(result)
}

fn prompt(debugger: &Debugger, lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<Resume> {
    loop {
        print!("(retro) ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            // stdin closed: let the run finish
            debugger.continue_execution()?;
            return Ok(Resume::Resumed);
        };

        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "c" => debugger.continue_execution()?,
            "s" => debugger.step_over()?,
            "i" => debugger.step_into()?,
            "o" => debugger.step_out()?,
            "q" => return Ok(Resume::Quit),
            "v" => {
                for variable in debugger.get_variables(None)? {
                    println!("  {}: {} = {}", variable.name, variable.type_name, variable.value);
                }
                continue;
            }
            "p" if !rest.trim().is_empty() => {
                match debugger.evaluate(rest.trim()) {
                    Ok(value) => println!("  {}", value),
                    Err(e) => println!("  error: {}", e),
                }
                continue;
            }
            "" => continue,
            _ => {
                println!("commands: c s i o v 'p <expr>' q");
                continue;
            }
        }
        return Ok(Resume::Resumed);
    }
}

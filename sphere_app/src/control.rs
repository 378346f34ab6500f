//! Stopping an unbounded run from the terminal

use std::io::{self, BufRead};
use std::thread;

use sphere_engine::StopHandle;

/// Command that ends the run
pub const QUIT: &str = "quit";

/// Block until `input` yields a `quit` line, ends, or fails
///
/// Returns true when `quit` was read.
pub fn wait_for_quit(input: impl BufRead) -> bool {
    input
        .lines()
        .map_while(Result::ok)
        .any(|line| line.trim().eq_ignore_ascii_case(QUIT))
}

/// Request a stop once stdin reads `quit` or is closed
///
/// The engine then finishes its frame and flushes the collision log.
pub fn stop_on_stdin(stop: StopHandle) -> io::Result<()> {
    thread::Builder::new().name("stdin-control".to_owned()).spawn(move || {
        let quit = wait_for_quit(io::stdin().lock());
        log::info!("{}, stopping simulation", if quit { "Quit requested" } else { "Input closed" });
        stop.request_stop();
    })?;
    Ok(())
}

//! Binary entrypoint for the chatdesk server.

use std::process::ExitCode;

use chatdesk::start_chatdesk;

fn main() -> ExitCode {
    start_chatdesk::run()
}

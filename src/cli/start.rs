use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or
/// action dispatch fails
pub fn start() -> Result<Action> {
    // 1. Parse command-line arguments
    let matches = commands::new().get_matches();

    // 2. Initialize telemetry from the verbosity count
    let verbosity = matches.get_one::<u8>("verbosity").copied().unwrap_or(0);
    telemetry::init(verbosity)?;

    // 3. Dispatch to the appropriate action
    let action = dispatch::handler(&matches)?;

    // 4. Return the action for execution by the binary
    Ok(action)
}

use anyhow::Result;
use blogga::cli::{actions::server, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    match action {
        Action::Server(args) => server::handle(args).await?,
    }

    Ok(())
}

//! Command handlers that talk to a server through a `Workbench`.

pub mod config_cmd;
pub mod events;
pub mod node;
pub mod session;
pub mod tree;
pub mod util;
pub mod wizard;

use dbweave_core::Workbench;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Route a server-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    workbench: &Workbench,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Tree(args) => tree::handle(args, workbench, global).await,
        Command::Node(args) => node::handle(args, workbench, global).await,
        Command::Session(args) => session::handle(args, workbench, resolved, global).await,
        Command::Wizard(args) => wizard::handle(args, workbench, global).await,
        Command::Events(args) => events::handle(args, workbench, global).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

mod command_error;
mod command_handler;
mod echo;
mod get;
mod info;
mod ping;
mod replication;
mod set;

pub use command_error::CommandError;
pub use command_handler::{CommandHandler, CommandResult};

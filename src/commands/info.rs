use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::RedisServer,
};

enum InfoSection {
    Default,
    Replication,
}

pub struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::InvalidInfoCommand);
        }

        let Some(section) = arguments.first() else {
            return Ok(InfoArguments {
                section: InfoSection::Default,
            });
        };

        let section = match section.to_lowercase().as_str() {
            "replication" => InfoSection::Replication,
            _ => return Err(CommandError::InvalidInfoSection),
        };

        Ok(InfoArguments { section })
    }
}

pub async fn info(
    server: Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let server_guard = server.read().await;

    let mut replication = vec![format!("role:{}", server_guard.role.as_string())];

    if let Some(replicas) = &server_guard.replicas {
        replication.push(format!("connected_slaves:{}", replicas.len()));
        replication.push(format!("master_replid:{}", server_guard.repl_id));
        replication.push(format!("master_repl_offset:{}", server_guard.repl_offset));
    }

    // Replication is the only section there is, so it is also the default.
    let body = match info_arguments.section {
        InfoSection::Default | InfoSection::Replication => replication.join("\r\n"),
    };

    Ok(CommandResult::Response(RespValue::BulkString(body).encode()))
}

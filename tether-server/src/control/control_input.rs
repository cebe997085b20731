use crate::coordinator::CoordinatorHandle;
use crate::error::Result;
use tether_core::ControlCommand;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

const EXIT_LINE: &str = "exit";

/// One line read from the parent.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInput {
    Command(ControlCommand),
    Exit,
    Ignored,
}

pub fn parse_line(line: &str) -> ControlInput {
    let line = line.trim();
    if line == EXIT_LINE {
        return ControlInput::Exit;
    }
    match ControlCommand::from_json(line) {
        Some(command) => ControlInput::Command(command),
        None => ControlInput::Ignored,
    }
}

/// Feeds commands from `reader` to the engine. Returns on EOF or `exit`.
pub async fn read_commands<R>(reader: R, handle: &CoordinatorHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ControlInput::Command(command) => handle.control(command).await?,
            ControlInput::Exit => {
                debug!("Exit requested by parent");
                return Ok(());
            }
            ControlInput::Ignored => {
                if !line.trim().is_empty() {
                    debug!("Ignoring control line: {}", line);
                }
            }
        }
    }

    debug!("Control input closed");
    Ok(())
}

//! Operator console
//!
//! Line commands read from stdin, standing in for the physical buttons and
//! configuration portal of a hardware node.

use anyhow::{anyhow, bail, Result};
use std::time::Instant;
use tally_client::{NodeStatus, TallyClient, WifiLink};
use tally_core::HubAddress;
use tally_transport::DatagramSocket;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const HELP: &str = "\
Commands:
  assign <source-id> [source name]   assign this node to a source
  unassign                           clear the assignment
  name <label>                       display-name override (empty to clear)
  device-name <name>                 rename this node
  reconnect                          re-register with the hub now
  hub <ip[:port]>                    use this hub address
  hub forget                         forget the hub and rediscover
  config | config clear              enter or leave configuration mode
  status                             print the node status
  help                               show this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Assign { source_id: String, source_name: String },
    Unassign,
    DisplayName(String),
    DeviceName(String),
    Reconnect,
    Hub(HubAddress),
    ForgetHub,
    ConfigMode,
    ClearConfigMode,
    Status,
    Help,
}

/// Parse one console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "assign" => {
            let (id, name) = match rest.split_once(char::is_whitespace) {
                Some((id, name)) => (id, name.trim()),
                None => (rest, ""),
            };
            if id.is_empty() {
                bail!("usage: assign <source-id> [source name]");
            }
            Command::Assign {
                source_id: id.to_string(),
                source_name: name.to_string(),
            }
        }
        "unassign" => Command::Unassign,
        "name" => Command::DisplayName(rest.to_string()),
        "device-name" => {
            if rest.is_empty() {
                bail!("usage: device-name <name>");
            }
            Command::DeviceName(rest.to_string())
        }
        "reconnect" => Command::Reconnect,
        "hub" => match rest {
            "" => bail!("usage: hub <ip[:port]> | hub forget"),
            "forget" => Command::ForgetHub,
            addr => Command::Hub(addr.parse().map_err(|e| anyhow!("{}", e))?),
        },
        "config" => match rest {
            "" => Command::ConfigMode,
            "clear" => Command::ClearConfigMode,
            _ => bail!("usage: config [clear]"),
        },
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        other => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(Some(command))
}

/// Forward parsed stdin lines until stdin closes or the receiver goes away
pub async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse(&line) {
                Ok(Some(command)) => {
                    if tx.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", e),
            },
            Ok(None) => {
                debug!("Console input closed");
                break;
            }
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        }
    }
}

/// Map a command onto the client's intents
pub fn apply<S: DatagramSocket, W: WifiLink>(
    client: &mut TallyClient<S, W>,
    command: Command,
    now: Instant,
) {
    match command {
        Command::Assign {
            source_id,
            source_name,
        } => {
            client.assign(&source_id, &source_name, now);
        }
        Command::Unassign => {
            client.unassign(now);
        }
        Command::DisplayName(name) => {
            client.set_display_name(&name);
        }
        Command::DeviceName(name) => {
            client.set_device_name(&name);
        }
        Command::Reconnect => client.force_reconnect(now),
        Command::Hub(hub) => client.set_hub_address(hub, now),
        Command::ForgetHub => client.forget_hub(),
        Command::ConfigMode => client.enter_config_mode(),
        Command::ClearConfigMode => client.clear_config_mode(),
        Command::Status => println!("{}", render(&client.status())),
        Command::Help => println!("{}", HELP),
    }
}

/// Multi-line status report
pub fn render(status: &NodeStatus) -> String {
    let hub = status
        .hub
        .map(|h| h.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let source = if status.assignment.is_assigned() {
        format!(
            "{} ({})",
            status.assignment.label(),
            status.assignment.source_id()
        )
    } else {
        "unassigned".to_string()
    };
    let tally = &status.tally;

    let mut out = format!(
        "{} \"{}\"\n  state:   {}{}\n  hub:     {}\n  source:  {}\n  tally:   program={} preview={} recording={} streaming={}{}\n  display: {}",
        status.device_id,
        status.device_name,
        status.state,
        if status.link_up { "" } else { " (link down)" },
        hub,
        source,
        tally.program(),
        tally.preview(),
        tally.recording(),
        tally.streaming(),
        if status.tally_trusted { "" } else { " (stale)" },
        status.indication.as_str(),
    );
    if let Some(admin) = &status.admin {
        out.push_str(&format!("\n  notice:  {}", admin.notice.text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assign() {
        assert_eq!(
            parse("assign cam1 Camera One").unwrap(),
            Some(Command::Assign {
                source_id: "cam1".to_string(),
                source_name: "Camera One".to_string(),
            })
        );
        assert_eq!(
            parse("  ASSIGN cam2 ").unwrap(),
            Some(Command::Assign {
                source_id: "cam2".to_string(),
                source_name: String::new(),
            })
        );
        assert!(parse("assign").is_err());
    }

    #[test]
    fn test_parse_hub() {
        assert_eq!(
            parse("hub 10.0.0.5").unwrap(),
            Some(Command::Hub("10.0.0.5:7411".parse().unwrap()))
        );
        assert_eq!(parse("hub forget").unwrap(), Some(Command::ForgetHub));
        assert!(parse("hub").is_err());
        assert!(parse("hub hub.local").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("unassign").unwrap(), Some(Command::Unassign));
        assert_eq!(parse("name").unwrap(), Some(Command::DisplayName(String::new())));
        assert_eq!(parse("config clear").unwrap(), Some(Command::ClearConfigMode));
        assert_eq!(parse("status").unwrap(), Some(Command::Status));
        assert!(parse("reboot").is_err());
    }
}

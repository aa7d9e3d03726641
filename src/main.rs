use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use competitive_match::game::state::{PlayerId, Side};
use competitive_match::host::{Host, HookResult, SimHost};
use competitive_match::{MatchConfig, MatchMetrics, MatchSession};

/// Engine frame interval for the harness
const TICK_INTERVAL: Duration = Duration::from_millis(100);

type SharedSession = Arc<Mutex<MatchSession<SimHost>>>;

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Connect {
        id: PlayerId,
        name: String,
        side: Option<Side>,
        bot: bool,
    },
    Disconnect(PlayerId),
    Join(PlayerId, Option<Side>),
    Health(PlayerId, i32),
    Pickup(PlayerId, String),
    Ready(PlayerId),
    Unready(PlayerId),
    Stay(PlayerId),
    Switch(PlayerId),
    Start,
    Restart,
    RoundStart,
    RoundEnd,
    WarmupEnd,
    MatchEnd,
    MapStart,
    Status,
    Metrics,
}

fn parse_side(token: &str) -> Result<Option<Side>, String> {
    match token.to_ascii_lowercase().as_str() {
        "attack" | "t" => Ok(Some(Side::Attack)),
        "defense" | "ct" => Ok(Some(Side::Defense)),
        "spec" | "none" => Ok(None),
        other => Err(format!("unknown side '{}'", other)),
    }
}

fn parse_id(token: Option<&str>) -> Result<PlayerId, String> {
    let token = token.ok_or("missing player id")?;
    token
        .parse()
        .map_err(|_| format!("invalid player id '{}'", token))
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or("empty command")?;

        let command = match verb {
            "connect" => {
                let id = parse_id(parts.next())?;
                let name = parts.next().ok_or("missing name")?.to_string();
                let side = parse_side(parts.next().unwrap_or("spec"))?;
                let bot = parts.next() == Some("bot");
                ConsoleCommand::Connect { id, name, side, bot }
            }
            "disconnect" => ConsoleCommand::Disconnect(parse_id(parts.next())?),
            "join" => {
                let id = parse_id(parts.next())?;
                ConsoleCommand::Join(id, parse_side(parts.next().ok_or("missing side")?)?)
            }
            "health" => {
                let id = parse_id(parts.next())?;
                let hp = parts
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("invalid health")?;
                ConsoleCommand::Health(id, hp)
            }
            "pickup" => {
                let id = parse_id(parts.next())?;
                ConsoleCommand::Pickup(id, parts.next().ok_or("missing item")?.to_string())
            }
            "ready" => ConsoleCommand::Ready(parse_id(parts.next())?),
            "unready" => ConsoleCommand::Unready(parse_id(parts.next())?),
            "stay" => ConsoleCommand::Stay(parse_id(parts.next())?),
            "switch" => ConsoleCommand::Switch(parse_id(parts.next())?),
            "start" => ConsoleCommand::Start,
            "restart" => ConsoleCommand::Restart,
            "round_start" => ConsoleCommand::RoundStart,
            "round_end" => ConsoleCommand::RoundEnd,
            "warmup_end" => ConsoleCommand::WarmupEnd,
            "match_end" => ConsoleCommand::MatchEnd,
            "map_start" => ConsoleCommand::MapStart,
            "status" => ConsoleCommand::Status,
            "metrics" => ConsoleCommand::Metrics,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(command)
    }
}

/// Feed one console command to the session as the engine would
fn apply(session: &SharedSession, command: ConsoleCommand) -> Option<String> {
    let mut session = session.lock();

    match command {
        ConsoleCommand::Connect { id, name, side, bot } => {
            session.host_mut().connect(id, &name, side, bot);
            session.on_player_connect(id);
        }
        ConsoleCommand::Disconnect(id) => {
            session.host_mut().disconnect(id);
            session.on_player_disconnect(id);
        }
        ConsoleCommand::Join(id, side) => match session.on_join_team(id, side) {
            HookResult::Continue => session.host_mut().set_side(id, side),
            HookResult::Stop => return Some(format!("join blocked for {}", id)),
        },
        ConsoleCommand::Health(id, hp) => session.host_mut().set_health(id, hp),
        ConsoleCommand::Pickup(id, item) => session.on_item_pickup(id, &item),
        ConsoleCommand::Ready(id) => {
            session.cmd_ready(id);
        }
        ConsoleCommand::Unready(id) => {
            session.cmd_unready(id);
        }
        ConsoleCommand::Stay(id) => {
            session.cmd_stay(id);
        }
        ConsoleCommand::Switch(id) => {
            session.cmd_switch(id);
        }
        ConsoleCommand::Start => {
            session.cmd_start();
        }
        ConsoleCommand::Restart => session.cmd_restart(),
        ConsoleCommand::RoundStart => {
            session.host_mut().respawn_all();
            session.on_round_start();
        }
        ConsoleCommand::RoundEnd => {
            session.on_round_end();
            session.host_mut().finish_round();
        }
        ConsoleCommand::WarmupEnd => session.on_warmup_end(),
        ConsoleCommand::MatchEnd => session.on_match_end(),
        ConsoleCommand::MapStart => session.on_map_start(),
        ConsoleCommand::Status => {
            return match serde_json::to_string_pretty(&session.status()) {
                Ok(json) => Some(json),
                Err(e) => Some(format!("status unavailable: {}", e)),
            };
        }
        ConsoleCommand::Metrics => return Some(session.metrics().render()),
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Competitive Match v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = MatchConfig::load_or_default();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }
    info!(
        "Configuration loaded: match_size={}, vote_policy={:?}, vote_start={:?}",
        config.match_size, config.vote_policy, config.vote_start
    );

    let metrics = Arc::new(MatchMetrics::new());
    let (host, commands) = SimHost::new();
    let session: SharedSession = Arc::new(Mutex::new(MatchSession::new(
        host,
        config,
        metrics.clone(),
        Instant::now(),
    )));

    // Print every engine request as one JSON line
    let printer = tokio::task::spawn_blocking(move || {
        for command in commands.iter() {
            match serde_json::to_string(&command) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Unprintable host command {:?}: {}", command, e),
            }
        }
    });

    let ticker = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                session.lock().on_tick(Instant::now());
            }
        })
    };

    let console = {
        let session = session.clone();
        async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if let Some(output) = apply(&session, command) {
                            println!("{}", output);
                        }
                    }
                    Err(e) => error!("{}", e),
                }
            }
            anyhow::Ok(())
        }
    };

    tokio::select! {
        result = console => {
            if let Err(e) = result {
                error!("Console error: {}", e);
            }
            info!("Console closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    ticker.abort();
    info!(
        players = session.lock().host().players().len(),
        "Stopped\n{}",
        metrics.render()
    );
    // Dropping the session closes the command channel and ends the printer
    drop(session);
    if let Err(e) = printer.await {
        warn!("Command printer stopped abnormally: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "connect 3 alice ct".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Connect {
                id: 3,
                name: "alice".to_string(),
                side: Some(Side::Defense),
                bot: false,
            })
        );
        assert_eq!(
            "join 3 spec".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Join(3, None))
        );
        assert_eq!("switch 9".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Switch(9)));
        assert_eq!("health 2 35".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Health(2, 35)));
        assert!("ready".parse::<ConsoleCommand>().is_err());
        assert!("dance 1".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn test_apply_drives_session() {
        let (host, _rx) = SimHost::new();
        let session: SharedSession = Arc::new(Mutex::new(MatchSession::new(
            host,
            MatchConfig {
                match_size: 2,
                ..MatchConfig::default()
            },
            Arc::new(MatchMetrics::new()),
            Instant::now(),
        )));
        session.lock().on_tick(Instant::now());

        for line in ["connect 1 a t", "join 1 t", "connect 2 b ct", "join 2 ct", "ready 1", "ready 2"] {
            apply(&session, line.parse().unwrap());
        }

        let status = apply(&session, ConsoleCommand::Status).unwrap();
        assert!(status.contains("\"phase\": \"knife\""));
    }
}

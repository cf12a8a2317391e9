//! Line-oriented input socket.
//!
//! Each line is one navigator input; each gets an `ok` or `error: <reason>`
//! reply. Accepted events are queued for the dispatcher.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info};

use xpanel_core::navigation::NavigationSnapshot;
use xpanel_core::{ErrorKind, PanelEvent, ScrollDirection, Side};

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Event(PanelEvent),
    /// Report the active window
    Status,
}

pub fn parse_line(line: &str) -> anyhow::Result<Request> {
    let mut parts = line.split_whitespace();
    let command = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty command"))?;

    let request = match command.to_lowercase().as_str() {
        "ok" => Request::Event(PanelEvent::Press(parse_side(parts.next())?)),
        "back" => Request::Event(PanelEvent::Back(parse_side(parts.next())?)),
        "wheel" => {
            let side = parse_side(parts.next())?;
            let value = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("missing wheel value"))?;
            let value = value
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid wheel value: {}", value))?;
            Request::Event(PanelEvent::Wheel { side, value })
        }
        "scroll" => {
            let side = parse_side(parts.next())?;
            let direction = match parts.next() {
                Some("forward") | Some("+") => ScrollDirection::Forward,
                Some("backward") | Some("-") => ScrollDirection::Backward,
                Some(other) => anyhow::bail!("invalid direction: {}", other),
                None => anyhow::bail!("missing direction"),
            };
            Request::Event(PanelEvent::Scroll(side, direction))
        }
        "enable" => Request::Event(PanelEvent::HardwareEnableChanged),
        "error" => {
            let kind = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("missing error kind"))?;
            let kind = ErrorKind::from_str(kind)
                .ok_or_else(|| anyhow::anyhow!("unknown error kind: {}", kind))?;
            Request::Event(PanelEvent::ErrorRaised(kind))
        }
        "status" => Request::Status,
        other => anyhow::bail!("unknown command: {}", other),
    };

    if let Some(extra) = parts.next() {
        anyhow::bail!("unexpected argument: {}", extra);
    }
    Ok(request)
}

fn parse_side(token: Option<&str>) -> anyhow::Result<Side> {
    let token = token.ok_or_else(|| anyhow::anyhow!("missing side"))?;
    Side::from_str(token).ok_or_else(|| anyhow::anyhow!("unknown side: {}", token))
}

/// Accept clients on `path` until the runtime shuts down
pub async fn serve(
    path: PathBuf,
    events: mpsc::Sender<PanelEvent>,
    snapshot: Arc<RwLock<NavigationSnapshot>>,
) -> anyhow::Result<()> {
    prepare_socket(&path)?;
    let listener = UnixListener::bind(&path)?;
    info!("Listening for input on {:?}", path);

    loop {
        let (stream, _) = listener.accept().await?;
        let events = events.clone();
        let snapshot = snapshot.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, events, snapshot).await {
                debug!("Input client dropped: {}", e);
            }
        });
    }
}

/// Remove a stale socket left by a previous run
fn prepare_socket(path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

async fn handle_client(
    stream: UnixStream,
    events: mpsc::Sender<PanelEvent>,
    snapshot: Arc<RwLock<NavigationSnapshot>>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("Input: {}", line);

        let reply = match parse_line(line) {
            Ok(Request::Event(event)) => match events.send(event).await {
                Ok(()) => "ok".to_string(),
                Err(_) => "error: daemon is shutting down".to_string(),
            },
            Ok(Request::Status) => {
                let snapshot = snapshot.read();
                format!(
                    "ok window={} example={}",
                    snapshot.active_window, snapshot.active_example_running
                )
            }
            Err(e) => format!("error: {}", e),
        };

        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigator_input() {
        assert_eq!(
            parse_line("ok left").unwrap(),
            Request::Event(PanelEvent::Press(Side::Left))
        );
        assert_eq!(
            parse_line("back r").unwrap(),
            Request::Event(PanelEvent::Back(Side::Right))
        );
        assert_eq!(
            parse_line("wheel right 4090").unwrap(),
            Request::Event(PanelEvent::Wheel {
                side: Side::Right,
                value: 4090
            })
        );
        assert_eq!(
            parse_line("scroll left -").unwrap(),
            Request::Event(PanelEvent::Scroll(Side::Left, ScrollDirection::Backward))
        );
    }

    #[test]
    fn test_parse_robot_input() {
        assert_eq!(
            parse_line("enable").unwrap(),
            Request::Event(PanelEvent::HardwareEnableChanged)
        );
        assert_eq!(
            parse_line("error calib_error").unwrap(),
            Request::Event(PanelEvent::ErrorRaised(ErrorKind::Calibration))
        );
        assert_eq!(parse_line("STATUS").unwrap(), Request::Status);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_line("ok").is_err());
        assert!(parse_line("ok middle").is_err());
        assert!(parse_line("wheel left fast").is_err());
        assert!(parse_line("error meltdown").is_err());
        assert!(parse_line("enable now").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn test_socket_round_trip() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xpanel.sock");

        runtime.block_on(async {
            let (tx, mut rx) = mpsc::channel(8);
            let snapshot = Arc::new(RwLock::new(NavigationSnapshot {
                active_window: "demo_1".into(),
                active_example_running: false,
            }));
            tokio::spawn(serve(path.clone(), tx, snapshot));
            while !path.exists() {
                tokio::task::yield_now().await;
            }

            let stream = UnixStream::connect(&path).await.unwrap();
            let (reader, mut writer) = stream.into_split();
            writer.write_all(b"ok left\nbogus\nstatus\n").await.unwrap();
            writer.shutdown().await.unwrap();

            let mut lines = BufReader::new(reader).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "ok");
            assert_eq!(
                lines.next_line().await.unwrap().unwrap(),
                "error: unknown command: bogus"
            );
            assert_eq!(
                lines.next_line().await.unwrap().unwrap(),
                "ok window=demo_1 example=false"
            );
            assert_eq!(rx.recv().await, Some(PanelEvent::Press(Side::Left)));
        });
    }
}

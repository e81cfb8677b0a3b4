//! Line-oriented JSON upstream.
//!
//! The capture side writes one event per line to our stdin and reads
//! navigation commands, one per line, from our stdout.

use crate::engine::SyncEngine;
use crate::error::UpstreamError;
use crate::upstream::Upstream;
use nav_extractor::RawNotification;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpstreamEvent {
    Posted {
        #[serde(flatten)]
        notification: RawNotification,
    },
    Removed,
    Access {
        granted: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UpstreamCommand {
    StartNavigation { uri: String },
    StopNavigation,
}

/// Upstream fed by `UpstreamEvent`s and answering with `UpstreamCommand`s
pub struct StdioUpstream {
    access: AtomicBool,
    active: Mutex<Option<RawNotification>>,
    commands: mpsc::UnboundedSender<UpstreamCommand>,
}

impl StdioUpstream {
    /// Access is assumed until the capture side says otherwise
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UpstreamCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let upstream = Self {
            access: AtomicBool::new(true),
            active: Mutex::new(None),
            commands,
        };
        (upstream, rx)
    }

    /// Remember what an event says about the upstream's state
    pub fn record(&self, event: &UpstreamEvent) {
        match event {
            UpstreamEvent::Posted { notification } => {
                *self.active_slot() = Some(notification.clone());
            }
            UpstreamEvent::Removed => {
                *self.active_slot() = None;
            }
            UpstreamEvent::Access { granted } => {
                self.access.store(*granted, Ordering::SeqCst);
            }
        }
    }

    fn active_slot(&self) -> std::sync::MutexGuard<'_, Option<RawNotification>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn command(&self, command: UpstreamCommand) -> Result<(), UpstreamError> {
        self.commands
            .send(command)
            .map_err(|_| UpstreamError::CommandFailed("command channel closed".to_string()))
    }
}

impl Upstream for StdioUpstream {
    fn has_notification_access(&self) -> bool {
        self.access.load(Ordering::SeqCst)
    }

    fn active_notification(&self) -> Option<RawNotification> {
        self.active_slot().clone()
    }

    fn start_navigation(&self, uri: &str) -> Result<(), UpstreamError> {
        self.command(UpstreamCommand::StartNavigation { uri: uri.to_string() })
    }

    fn stop_navigation(&self) -> Result<(), UpstreamError> {
        self.command(UpstreamCommand::StopNavigation)
    }
}

/// Feed events read from `reader` into the engine until EOF
pub async fn pump_events<R>(
    reader: R,
    upstream: Arc<StdioUpstream>,
    engine: SyncEngine<Arc<StdioUpstream>>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<UpstreamEvent>(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to parse upstream event: {}", e);
                continue;
            }
        };

        upstream.record(&event);
        match event {
            UpstreamEvent::Posted { notification } => {
                debug!("Navigation notification posted");
                engine.notify(notification).await;
            }
            UpstreamEvent::Removed => engine.notification_removed().await,
            UpstreamEvent::Access { granted } => engine.access_changed(granted).await,
        }
    }

    info!("Upstream event stream closed");
    Ok(())
}

/// Write commands as JSON lines until every sender is gone
pub async fn write_commands<W>(
    mut writer: W,
    mut commands: mpsc::UnboundedReceiver<UpstreamCommand>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let json = serde_json::to_string(&command)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_events() {
        let event: UpstreamEvent = serde_json::from_str(
            r#"{"event":"posted","fields":[{"entry":"nav_title","kind":"text","text":"300 m"}],"postTime":7}"#,
        )
        .unwrap();
        match event {
            UpstreamEvent::Posted { notification } => {
                assert_eq!(notification.fields.len(), 1);
                assert_eq!(notification.post_time.0, 7);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let event: UpstreamEvent = serde_json::from_str(r#"{"event":"access","granted":false}"#).unwrap();
        assert_eq!(event, UpstreamEvent::Access { granted: false });
    }

    #[test]
    fn test_record_tracks_state() {
        let (upstream, _rx) = StdioUpstream::new();
        assert!(upstream.has_notification_access());

        upstream.record(&UpstreamEvent::Posted {
            notification: RawNotification::default(),
        });
        assert!(upstream.active_notification().is_some());

        upstream.record(&UpstreamEvent::Removed);
        upstream.record(&UpstreamEvent::Access { granted: false });
        assert!(upstream.active_notification().is_none());
        assert!(!upstream.has_notification_access());
    }

    #[tokio::test]
    async fn test_commands_written_as_lines() {
        let (upstream, rx) = StdioUpstream::new();
        upstream.start_navigation("google.navigation:?q=Home&mode=d").unwrap();
        upstream.stop_navigation().unwrap();
        drop(upstream);

        let mut out = Vec::new();
        write_commands(&mut out, rx).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"command":"start_navigation","uri":"google.navigation:?q=Home&mode=d"}"#,
                r#"{"command":"stop_navigation"}"#,
            ]
        );
    }
}

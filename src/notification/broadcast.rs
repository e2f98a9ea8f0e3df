use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

use super::{Notification, NotificationSink};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;
pub const DEFAULT_RECENT_SIZE: usize = 50;

/// Notification sink that fans notifications out over a tokio broadcast channel.
///
/// The last few notifications are also kept in a bounded buffer so a consumer that
/// subscribes late can replay them.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
    recent: Arc<RwLock<VecDeque<Notification>>>,
    recent_size: usize,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize, recent_size: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            recent: Arc::new(RwLock::new(VecDeque::with_capacity(recent_size))),
            recent_size,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        debug!("New notification subscriber");
        self.sender.subscribe()
    }

    /// Snapshot of the most recent notifications, oldest first
    pub async fn recent(&self) -> Vec<Notification> {
        self.recent.read().await.iter().cloned().collect()
    }

    async fn remember(&self, notification: Notification) {
        let mut recent = self.recent.write().await;
        recent.push_back(notification);
        while recent.len() > self.recent_size {
            recent.pop_front();
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, DEFAULT_RECENT_SIZE)
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        self.remember(notification.clone()).await;

        // Having nobody listening is not an error, the notification stays replayable
        match self.sender.send(notification) {
            Ok(receivers) => trace!(receivers, "Notification broadcast"),
            Err(_) => debug!("No notification subscribers, kept in recent buffer"),
        }
        Ok(())
    }
}

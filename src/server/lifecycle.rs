use crate::error::{Error, Result};
use crate::server::ServerId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Maximum number of events kept for each server
const MAX_EVENTS_PER_SERVER: usize = 1000;

/// Server lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycleEvent {
    /// Server started
    Started,
    /// Server stopped
    Stopped,
    /// Server restarted
    Restarted,
    /// Artifact replaced by an update
    Updated,
    /// A setting was changed
    Reconfigured,
    /// An operation failed
    Failed,
}

/// Server lifecycle event
#[derive(Debug, Clone)]
pub struct ServerEvent {
    /// Server ID
    pub id: ServerId,
    /// Server name
    pub name: String,
    /// Event type
    pub event: ServerLifecycleEvent,
    /// Event timestamp
    pub timestamp: SystemTime,
    /// Event details
    pub details: Option<String>,
}

/// Per-server event queues, oldest first
#[derive(Default)]
struct EventLog {
    /// Sequence number of the next event, orders events across servers
    next_seq: u64,
    by_server: HashMap<ServerId, VecDeque<(u64, ServerEvent)>>,
}

/// Bounded history of lifecycle events, capped separately for each server
#[derive(Clone)]
pub struct ServerLifecycleManager {
    events: Arc<Mutex<EventLog>>,
}

impl ServerLifecycleManager {
    /// Create a new server lifecycle manager
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(EventLog::default())),
        }
    }

    fn log(&self) -> Result<std::sync::MutexGuard<'_, EventLog>> {
        self.events
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))
    }

    /// Record a server event
    pub fn record_event(
        &self,
        id: ServerId,
        name: &str,
        event: ServerLifecycleEvent,
        details: Option<String>,
    ) -> Result<()> {
        let mut log = self.log()?;
        let seq = log.next_seq;
        log.next_seq += 1;

        let events = log.by_server.entry(id).or_default();
        events.push_back((
            seq,
            ServerEvent {
                id,
                name: name.to_string(),
                event,
                timestamp: SystemTime::now(),
                details,
            },
        ));

        if events.len() > MAX_EVENTS_PER_SERVER {
            events.pop_front();
        }

        Ok(())
    }

    /// Get recent events for a server, newest first
    pub fn get_server_events(&self, id: ServerId, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let log = self.log()?;
        Ok(log
            .by_server
            .get(&id)
            .map(|events| {
                events
                    .iter()
                    .rev()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|(_, e)| e.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Get all events, newest first
    pub fn get_all_events(&self, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let log = self.log()?;
        let mut all: Vec<_> = log.by_server.values().flatten().collect();
        all.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        Ok(all
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, e)| e.clone())
            .collect())
    }

    /// Clear events
    pub fn clear_events(&self) -> Result<()> {
        self.log()?.by_server.clear();
        Ok(())
    }
}

impl Default for ServerLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_newest_first_and_bounded() -> Result<()> {
        let manager = ServerLifecycleManager::new();
        let alpha = ServerId::new();
        let beta = ServerId::new();

        manager.record_event(alpha, "Alpha", ServerLifecycleEvent::Started, None)?;
        manager.record_event(beta, "Beta", ServerLifecycleEvent::Started, None)?;
        manager.record_event(alpha, "Alpha", ServerLifecycleEvent::Stopped, Some("console".into()))?;

        let events = manager.get_server_events(alpha, None)?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, ServerLifecycleEvent::Stopped);
        assert_eq!(events[1].event, ServerLifecycleEvent::Started);
        assert_eq!(manager.get_all_events(Some(1))?[0].name, "Alpha");
        assert_eq!(manager.get_all_events(Some(2))?[1].name, "Beta");

        for _ in 0..=MAX_EVENTS_PER_SERVER {
            manager.record_event(beta, "Beta", ServerLifecycleEvent::Reconfigured, None)?;
        }
        assert_eq!(manager.get_server_events(beta, None)?.len(), MAX_EVENTS_PER_SERVER);
        // a busy server does not push out another server's history
        assert_eq!(manager.get_server_events(alpha, None)?.len(), 2);
        assert_eq!(manager.get_all_events(None)?.len(), MAX_EVENTS_PER_SERVER + 2);

        manager.clear_events()?;
        assert!(manager.get_all_events(None)?.is_empty());
        Ok(())
    }
}

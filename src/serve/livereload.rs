//! Live-reload notifications.
//!
//! Build steps publish [`ReloadEvent`]s; every connected browser session
//! holds a subscription and receives them as Server-Sent Events.

use tokio::sync::broadcast;

/// Events buffered per subscriber before slow clients start missing them.
const CHANNEL_CAPACITY: usize = 64;

/// A change pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// These stylesheets (paths relative to the output root) changed;
    /// clients swap them in place.
    Stylesheets(Vec<String>),

    /// Markup changed; clients reload the page.
    Page,
}

impl ReloadEvent {
    /// SSE event name understood by the client script.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Stylesheets(_) => "css",
            ReloadEvent::Page => "reload",
        }
    }

    /// SSE payload: a JSON array of changed paths.
    pub fn data(&self) -> String {
        let paths: &[String] = match self {
            ReloadEvent::Stylesheets(paths) => paths,
            ReloadEvent::Page => &[],
        };
        serde_json::to_string(paths).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Broadcast hub shared by the steps and the dev server.
#[derive(Debug, Clone)]
pub struct LiveReload {
    sender: broadcast::Sender<ReloadEvent>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscriptions (connected browser sessions).
    pub fn session_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Push new stylesheets without a full page reload.
    pub fn reload_stylesheets(&self, paths: Vec<String>) {
        self.publish(ReloadEvent::Stylesheets(paths));
    }

    /// Ask every session to reload the page.
    pub fn reload_page(&self) {
        self.publish(ReloadEvent::Page);
    }

    fn publish(&self, event: ReloadEvent) {
        // Nobody listening is fine
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(sessions = delivered, "live reload published");
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

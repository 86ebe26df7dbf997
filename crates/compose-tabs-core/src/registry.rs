//! Pane registry: one display pane per discovered service

use crate::types::{LogLine, ServiceId};
use indexmap::IndexMap;

/// Rendering side of the pump: whatever can host named panes of text
pub trait PaneSurface {
    /// Opaque reference to a created pane
    type Handle: Clone;

    /// Create a new pane labeled with the service id
    fn create_pane(&mut self, label: &ServiceId) -> Self::Handle;

    /// Append one line of text to a pane
    fn append_line(&mut self, pane: &Self::Handle, text: &str);
}

/// Whether routing had to create a pane first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Created,
    Appended,
}

/// Insertion-ordered map from service id to pane handle.
///
/// Panes are created on first sight of a service and never removed.
#[derive(Debug)]
pub struct PaneRegistry<H> {
    panes: IndexMap<ServiceId, H>,
    last_routed: Option<usize>,
}

impl<H> Default for PaneRegistry<H> {
    fn default() -> Self {
        Self {
            panes: IndexMap::new(),
            last_routed: None,
        }
    }
}

impl<H: Clone> PaneRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the message to its service's pane, creating the pane on a miss
    pub fn route<S>(&mut self, surface: &mut S, line: LogLine) -> RouteOutcome
    where
        S: PaneSurface<Handle = H>,
    {
        let LogLine { service, message } = line;

        let (index, outcome) = match self.panes.get_index_of(&service) {
            Some(index) => (index, RouteOutcome::Appended),
            None => {
                tracing::info!("New service discovered: {}", service);
                let handle = surface.create_pane(&service);
                let (index, _) = self.panes.insert_full(service, handle);
                (index, RouteOutcome::Created)
            }
        };

        if let Some((_, handle)) = self.panes.get_index(index) {
            surface.append_line(handle, &message);
        }
        self.last_routed = Some(index);
        outcome
    }

    /// Append an unframed line to the most recently routed pane.
    ///
    /// Returns `false` when no pane exists yet.
    pub fn route_continuation<S>(&mut self, surface: &mut S, text: &str) -> bool
    where
        S: PaneSurface<Handle = H>,
    {
        match self.last_routed.and_then(|i| self.panes.get_index(i)) {
            Some((_, handle)) => {
                surface.append_line(handle, text);
                true
            }
            None => false,
        }
    }

    /// Service ids in pane creation order
    pub fn labels(&self) -> impl Iterator<Item = &ServiceId> {
        self.panes.keys()
    }

    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSurface;
    use super::*;
    use crate::parser::parse_frame;

    fn line(s: &str) -> LogLine {
        parse_frame(s).unwrap()
    }

    #[test]
    fn test_same_service_creates_one_pane() {
        let mut surface = RecordingSurface::default();
        let mut registry = PaneRegistry::new();

        assert_eq!(registry.route(&mut surface, line("web | a")), RouteOutcome::Created);
        assert_eq!(registry.route(&mut surface, line("web | b")), RouteOutcome::Appended);

        assert_eq!(surface.creates, 1);
        assert_eq!(surface.lines("web"), vec!["a", "b"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_per_service_order_with_interleaving() {
        let mut surface = RecordingSurface::default();
        let mut registry = PaneRegistry::new();

        for l in ["web | a", "db | x", "web | b"] {
            registry.route(&mut surface, line(l));
        }

        assert_eq!(surface.lines("web"), vec!["a", "b"]);
        assert_eq!(surface.lines("db"), vec!["x"]);
        let labels: Vec<_> = registry.labels().map(|s| s.to_string()).collect();
        assert_eq!(labels, vec!["web", "db"]);
    }

    #[test]
    fn test_continuation_goes_to_last_routed_pane() {
        let mut surface = RecordingSurface::default();
        let mut registry = PaneRegistry::new();

        assert!(!registry.route_continuation(&mut surface, "orphan"));

        registry.route(&mut surface, line("web | panic: boom"));
        registry.route(&mut surface, line("db | ok"));
        registry.route(&mut surface, line("web | trace:"));
        assert!(registry.route_continuation(&mut surface, "    at main.rs:1"));

        assert_eq!(surface.lines("web"), vec!["panic: boom", "trace:", "    at main.rs:1"]);
        assert_eq!(surface.lines("db"), vec!["ok"]);
    }
}

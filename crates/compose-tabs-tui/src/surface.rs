//! Channel-backed pane surface
//!
//! The pump task never touches UI state directly. Pane creation and line
//! appends are sent as events to the render loop, which applies them in
//! the order they were produced.

use compose_tabs_core::{PaneSurface, ServiceId};
use tokio::sync::mpsc;

/// Index of a pane in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaneId(pub usize);

/// Surface operations forwarded to the render loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    PaneCreated { pane: PaneId, label: String },
    Line { pane: PaneId, text: String },
}

/// `PaneSurface` that forwards every call over an unbounded channel
#[derive(Debug)]
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<UiEvent>,
    next_pane: usize,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx, next_pane: 0 }
    }

    fn send(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("UI receiver gone, dropping event");
        }
    }
}

impl PaneSurface for ChannelSurface {
    type Handle = PaneId;

    fn create_pane(&mut self, label: &ServiceId) -> PaneId {
        let pane = PaneId(self.next_pane);
        self.next_pane += 1;
        self.send(UiEvent::PaneCreated {
            pane,
            label: label.to_string(),
        });
        pane
    }

    fn append_line(&mut self, pane: &PaneId, text: &str) {
        self.send(UiEvent::Line {
            pane: *pane,
            text: text.to_string(),
        });
    }
}

//! Active source selection and change notification.
//!
//! [`ManagerState`] is the single owner of "which binary is in use" for each
//! tool kind. It is mutated only through its methods, and every change is
//! published on a broadcast channel so any number of UI listeners can follow
//! along without polling.

use crate::config::ToolKind;
use crate::discovery::select_best;
use crate::error::{DocconvError, Result};
use crate::models::{DownloadProgress, ToolManager};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

/// Notifications published by [`ManagerState`] and the update pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ManagerEvent {
    /// A discovery pass finished; carries the complete candidate list.
    SourcesDiscovered {
        tool: ToolKind,
        managers: Vec<ToolManager>,
    },
    /// The active source changed (`None` when nothing usable remains).
    ActiveSourceChanged {
        tool: ToolKind,
        manager: Option<ToolManager>,
    },
    DownloadProgress {
        tool: ToolKind,
        progress: DownloadProgress,
    },
    UpdateInstalled {
        tool: ToolKind,
        version: String,
    },
    UpdateFailed {
        tool: ToolKind,
        message: String,
    },
}

#[derive(Debug, Default)]
struct ToolSlot {
    current: Option<ToolManager>,
    /// `None` until the first discovery pass.
    discovered: Option<Vec<ToolManager>>,
}

/// Current and discovered managers for every tool kind.
#[derive(Debug)]
pub struct ManagerState {
    slots: HashMap<ToolKind, ToolSlot>,
    events: broadcast::Sender<ManagerEvent>,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            slots: HashMap::new(),
            events,
        }
    }

    pub fn current(&self, tool: ToolKind) -> Option<&ToolManager> {
        self.slots.get(&tool).and_then(|s| s.current.as_ref())
    }

    /// Last discovery result; `None` if discovery never ran for `tool`.
    pub fn discovered(&self, tool: ToolKind) -> Option<&[ToolManager]> {
        self.slots.get(&tool).and_then(|s| s.discovered.as_deref())
    }

    /// Store a completed discovery pass without touching the active source.
    pub fn record_discovery(&mut self, tool: ToolKind, managers: Vec<ToolManager>) {
        debug!("Recorded {} {} sources", managers.len(), tool);
        self.slots.entry(tool).or_default().discovered = Some(managers.clone());
        self.publish(ManagerEvent::SourcesDiscovered { tool, managers });
    }

    /// Record a discovery pass and make its best candidate active.
    ///
    /// When no candidate is available the list is still recorded and the
    /// active source is cleared.
    pub fn initialize(&mut self, tool: ToolKind, managers: Vec<ToolManager>) -> Option<ToolManager> {
        let best = select_best(&managers);
        self.record_discovery(tool, managers);
        self.set_current(tool, best.clone());
        best
    }

    /// Make `manager` the active source for its tool.
    ///
    /// Unavailable managers are rejected and leave the state unchanged.
    pub fn switch(&mut self, tool: ToolKind, manager: ToolManager) -> Result<()> {
        if !manager.is_available() {
            return Err(DocconvError::SourceUnavailable {
                source_desc: manager.source().to_string(),
            });
        }
        if manager.tool().is_some_and(|t| t != tool) {
            return Err(DocconvError::Validation {
                field: "manager".into(),
                message: format!("manager is for {:?}, not {}", manager.tool(), tool),
            });
        }
        info!("Switching {} to {} at {}", tool, manager.source(), manager.path().display());
        self.set_current(tool, Some(manager));
        Ok(())
    }

    fn set_current(&mut self, tool: ToolKind, manager: Option<ToolManager>) {
        let slot = self.slots.entry(tool).or_default();
        if slot.current == manager {
            return;
        }
        slot.current = manager.clone();
        self.publish(ManagerEvent::ActiveSourceChanged { tool, manager });
    }

    /// Send an event to all current subscribers. Having none is not an error.
    pub fn publish(&self, event: ManagerEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    /// A sender for publishing without holding the state lock.
    pub fn event_sender(&self) -> broadcast::Sender<ManagerEvent> {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvalidReason, ToolInfo, ToolSource};
    use std::path::PathBuf;

    fn working(source: ToolSource, path: &str, version: &str) -> ToolManager {
        ToolManager::available(
            source,
            ToolInfo {
                tool: ToolKind::Pandoc,
                version: version.into(),
                path: PathBuf::from(path),
                is_working: true,
                supported_input_formats: vec![],
                supported_output_formats: vec![],
                detected_paths: vec![],
                search_paths: vec![],
            },
        )
    }

    fn broken(path: &str) -> ToolManager {
        ToolManager::unavailable(
            ToolSource::Custom(path.into()),
            path,
            InvalidReason::NotFound,
        )
    }

    #[test]
    fn test_discovered_is_none_until_first_pass() {
        let mut state = ManagerState::new();
        assert!(state.discovered(ToolKind::Pandoc).is_none());
        state.record_discovery(ToolKind::Pandoc, vec![]);
        assert_eq!(state.discovered(ToolKind::Pandoc), Some(&[][..]));
    }

    #[test]
    fn test_initialize_picks_best_and_keeps_list() {
        let mut state = ManagerState::new();
        let managers = vec![
            broken("/tmp/doesnotexist"),
            working(ToolSource::Managed, "/data/tools/pandoc/pandoc", "3.7"),
            working(ToolSource::System("/usr/bin/pandoc".into()), "/usr/bin/pandoc", "3.1.2"),
        ];
        let best = state.initialize(ToolKind::Pandoc, managers).unwrap();
        assert_eq!(best.source(), &ToolSource::Managed);
        assert_eq!(state.current(ToolKind::Pandoc), Some(&best));
        assert_eq!(state.discovered(ToolKind::Pandoc).unwrap().len(), 3);
    }

    #[test]
    fn test_initialize_without_working_candidate() {
        let mut state = ManagerState::new();
        assert!(state.initialize(ToolKind::Pandoc, vec![broken("/a")]).is_none());
        assert!(state.current(ToolKind::Pandoc).is_none());
        assert_eq!(state.discovered(ToolKind::Pandoc).unwrap().len(), 1);
    }

    #[test]
    fn test_switch_rejects_unavailable() {
        let mut state = ManagerState::new();
        let system = working(ToolSource::System("/usr/bin/pandoc".into()), "/usr/bin/pandoc", "3.1.2");
        state.switch(ToolKind::Pandoc, system.clone()).unwrap();

        let err = state.switch(ToolKind::Pandoc, broken("/tmp/doesnotexist")).unwrap_err();
        assert!(matches!(err, DocconvError::SourceUnavailable { .. }));
        assert_eq!(state.current(ToolKind::Pandoc), Some(&system));
    }

    #[test]
    fn test_switch_rejects_other_tool() {
        let mut state = ManagerState::new();
        let pandoc = working(ToolSource::Managed, "/p", "3.7");
        assert!(state.switch(ToolKind::Typst, pandoc).is_err());
        assert!(state.current(ToolKind::Typst).is_none());
    }

    #[tokio::test]
    async fn test_events_are_published_once_per_change() {
        let mut state = ManagerState::new();
        let mut rx = state.subscribe();
        let managed = working(ToolSource::Managed, "/p", "3.7");

        state.switch(ToolKind::Pandoc, managed.clone()).unwrap();
        state.switch(ToolKind::Pandoc, managed).unwrap();

        match rx.recv().await.unwrap() {
            ManagerEvent::ActiveSourceChanged { tool, manager } => {
                assert_eq!(tool, ToolKind::Pandoc);
                assert!(manager.is_some());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}

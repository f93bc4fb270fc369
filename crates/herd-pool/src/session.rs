use std::collections::HashSet;

use tokio::sync::oneshot;

/// What happens once the fleet has fully drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompletionAction {
    /// Supervisor stops
    Exit,
    /// Pool is respawned with the same port layout
    Restart,
}

/// Bookkeeping for one in-flight fleet-wide shutdown or restart.
///
/// At most one session exists at a time; its presence is the latch that
/// makes concurrent shutdown/restart requests idempotent.
#[derive(Debug)]
pub(crate) struct ShutdownSession {
    pub id: u64,
    pub action: CompletionAction,
    /// Slots that have not yet confirmed exit
    pub outstanding: HashSet<usize>,
    /// Completion signals for every caller attached to this session
    pub listeners: Vec<oneshot::Sender<()>>,
}

impl ShutdownSession {
    pub fn new(id: u64, action: CompletionAction) -> Self {
        Self {
            id,
            action,
            outstanding: HashSet::new(),
            listeners: Vec::new(),
        }
    }

    /// Count a slot's exit toward the session tally.
    pub fn confirm_exit(&mut self, slot: usize) -> bool {
        self.outstanding.remove(&slot)
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }
}

use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::info;

use crate::collaborators::ExternalCommandDrain;

/// Control directives (`[ts] NAME;args`) waiting to be processed.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Mutex<VecDeque<String>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, directive: impl Into<String>) {
        self.pending.lock().push_back(directive.into());
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl ExternalCommandDrain for CommandQueue {
    fn drain(&self) -> usize {
        let directives: Vec<String> = self.pending.lock().drain(..).collect();
        for directive in &directives {
            info!(target: "netpulse::events", "EXTERNAL COMMAND: {}", directive);
        }
        directives.len()
    }
}

//! In-memory [`Backend`] used by integration tests so the matcher and
//! desugarer can be exercised without linking `libotf`/`libotf2`.

use std::collections::HashMap;
use std::path::Path;

use super::{Backend, DefRecord, DefinitionSink, EventRecord, EventSink};
use crate::error::{Error, FormatError};
use crate::ids::ProcessId;

/// A trace held entirely in memory, built up by a test before being
/// handed to the loader through [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockTrace {
    pub definitions: Vec<DefRecord>,
    pub events: HashMap<ProcessId, Vec<EventRecord>>,
}

impl MockTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, record: DefRecord) -> Self {
        self.definitions.push(record);
        self
    }

    pub fn event(mut self, process: ProcessId, record: EventRecord) -> Self {
        self.events.entry(process).or_default().push(record);
        self
    }
}

pub struct MockBackend {
    trace: MockTrace,
    selected: Option<ProcessId>,
}

impl MockBackend {
    pub fn new(trace: MockTrace) -> Self {
        MockBackend {
            trace,
            selected: None,
        }
    }

    /// Never participates in format auto-detection; tests construct it
    /// directly instead of going through [`super::open`].
    pub fn try_open(_path: &Path) -> Result<Option<Self>, FormatError> {
        Ok(None)
    }
}

impl Backend for MockBackend {
    fn read_definitions(&mut self, sink: &mut dyn DefinitionSink) -> Result<(), Error> {
        for record in self.trace.definitions.clone() {
            sink.accept(record)?;
        }
        Ok(())
    }

    fn select_process(&mut self, process: ProcessId) -> Result<(), Error> {
        self.selected = Some(process);
        Ok(())
    }

    fn read_events(&mut self, sink: &mut dyn EventSink) -> Result<(), Error> {
        let process = self
            .selected
            .ok_or(FormatError::DecodeFailed {
                what: "events",
                reason: "no process selected".to_string(),
            })?;
        if let Some(events) = self.trace.events.get(&process) {
            for record in events.clone() {
                sink.accept(record)?;
            }
        }
        Ok(())
    }
}

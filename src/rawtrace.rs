//! C4+C5: event loading and the raw trace accumulator (§4.4, §4.5).
//!
//! [`RawTrace`] owns one open [`format::Backend`] handle and is the only
//! place definitions and events flow through the non-blocking
//! [`Desugarer`]. It is re-entrant: `load_definitions` and
//! `load_events(p)` are no-ops on repeat calls for the same argument,
//! and nothing about loading events consumes the store — `to_trace`
//! reads through a shared reference.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use crate::definitions::DefinitionContext;
use crate::desugar::{Cancelled, Desugarer, ReceivedMessage, SentMessage};
use crate::error::{DefinitionError, Error, MatchError};
use crate::format::{self, Backend, EventRecord, EventSink, TraceFormat};
use crate::ids::ProcessId;
use crate::trace::Trace;

pub struct RawTrace {
    backend: Box<dyn Backend>,
    format: TraceFormat,
    definitions: DefinitionContext,
    loaded_definitions: bool,
    loaded_events: HashSet<ProcessId>,

    sent_messages: HashMap<ProcessId, Vec<SentMessage>>,
    received_messages: HashMap<ProcessId, Vec<ReceivedMessage>>,

    begin_time: crate::ids::Timestamp,
    end_time: crate::ids::Timestamp,
}

impl RawTrace {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let (format, backend) = format::open(path)?;
        Ok(Self::from_backend(format, backend))
    }

    /// Builds a `RawTrace` around an already-open backend, e.g. a
    /// [`format::mock::MockBackend`] in tests.
    pub fn from_backend(format: TraceFormat, backend: Box<dyn Backend>) -> Self {
        RawTrace {
            backend,
            format,
            definitions: DefinitionContext::new(),
            loaded_definitions: false,
            loaded_events: HashSet::new(),
            sent_messages: HashMap::new(),
            received_messages: HashMap::new(),
            begin_time: crate::ids::Timestamp::MAX,
            end_time: crate::ids::Timestamp::MIN,
        }
    }

    pub fn format(&self) -> TraceFormat {
        self.format
    }

    pub fn load_definitions(&mut self) -> Result<(), Error> {
        if self.loaded_definitions {
            return Ok(());
        }
        self.backend.read_definitions(&mut self.definitions)?;
        self.definitions.finalize()?;
        self.loaded_definitions = true;
        Ok(())
    }

    pub fn load_events(&mut self, process: ProcessId) -> Result<(), Error> {
        if !self.loaded_definitions {
            return Err(DefinitionError::DefinitionsNotLoaded.into());
        }
        if self.loaded_events.contains(&process) {
            return Ok(());
        }

        self.sent_messages.entry(process).or_default();
        self.received_messages.entry(process).or_default();

        self.backend.select_process(process)?;

        let mut sink = EventCollector {
            definitions: &self.definitions,
            desugarer: Desugarer::new(),
            current_process: process,
            sent: self.sent_messages.get_mut(&process).unwrap(),
            received: self.received_messages.get_mut(&process).unwrap(),
            begin_time: &mut self.begin_time,
            end_time: &mut self.end_time,
        };
        self.backend.read_events(&mut sink)?;

        self.loaded_events.insert(process);
        Ok(())
    }

    pub fn load_all_events(&mut self) -> Result<(), Error> {
        self.load_definitions()?;
        let processes: Vec<ProcessId> = self.definitions.processes().collect();
        for process in processes {
            self.load_events(process)?;
        }
        Ok(())
    }

    pub fn all_events_loaded(&self) -> bool {
        self.loaded_definitions
            && self.loaded_events.len() == self.definitions.processes().count()
    }

    pub fn begin_time(&self) -> Result<crate::ids::Timestamp, DefinitionError> {
        if !self.all_events_loaded() {
            return Err(DefinitionError::DefinitionsNotLoaded);
        }
        Ok(self.begin_time)
    }

    pub fn end_time(&self) -> Result<crate::ids::Timestamp, DefinitionError> {
        if !self.all_events_loaded() {
            return Err(DefinitionError::DefinitionsNotLoaded);
        }
        Ok(self.end_time)
    }

    pub fn processes(&self) -> Result<Vec<ProcessId>, DefinitionError> {
        if !self.loaded_definitions {
            return Err(DefinitionError::DefinitionsNotLoaded);
        }
        Ok(self.definitions.processes().collect())
    }

    pub fn definitions(&self) -> &DefinitionContext {
        &self.definitions
    }

    pub fn sent_messages(&self, process: ProcessId) -> &[SentMessage] {
        self.sent_messages
            .get(&process)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn received_messages(&self, process: ProcessId) -> &[ReceivedMessage] {
        self.received_messages
            .get(&process)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Matches sends to receives and orders processes into a [`Trace`].
    /// Does not consume `self`: the raw store remains readable and
    /// `to_trace` may be called again, e.g. after loading more
    /// processes' events.
    pub fn to_trace(&self) -> Result<Trace, Error> {
        if !self.all_events_loaded() {
            let pending = self
                .definitions
                .processes()
                .find(|p| !self.loaded_events.contains(p))
                .unwrap_or(ProcessId(-1));
            return Err(DefinitionError::EventsNotLoaded(pending).into());
        }
        Ok(crate::trace::build_trace(self)?)
    }
}

struct EventCollector<'a> {
    definitions: &'a DefinitionContext,
    desugarer: Desugarer,
    /// Process `load_events` was called for; a global OTF2 reader can
    /// still surface events for other locations (§4.4), so every record
    /// is checked against this before being attributed.
    current_process: ProcessId,
    sent: &'a mut Vec<SentMessage>,
    received: &'a mut Vec<ReceivedMessage>,
    begin_time: &'a mut crate::ids::Timestamp,
    end_time: &'a mut crate::ids::Timestamp,
}

impl<'a> EventCollector<'a> {
    fn note_time(&mut self, time: crate::ids::Timestamp) {
        *self.begin_time = (*self.begin_time).min(time);
        *self.end_time = (*self.end_time).max(time);
    }
}

impl<'a> EventSink for EventCollector<'a> {
    fn accept(&mut self, record: EventRecord) -> Result<(), Error> {
        if record.location() != self.current_process {
            return Ok(());
        }
        match record {
            EventRecord::Otf1Send {
                time,
                sender: _,
                receiver,
                group,
                tag,
                length,
            } => {
                self.sent.push(SentMessage {
                    time,
                    receiver,
                    group,
                    length,
                    tag,
                });
            }
            EventRecord::Otf1Receive {
                time,
                receiver: _,
                sender,
                group,
                tag,
                length,
            } => {
                self.received.push(ReceivedMessage {
                    time,
                    sender,
                    group,
                    length,
                    tag,
                });
            }
            EventRecord::Otf1Enter { time, .. } | EventRecord::Otf1Leave { time, .. } => {
                self.note_time(time);
            }

            EventRecord::MpiSend {
                time,
                receiver_local_rank,
                comm,
                tag,
                length,
                ..
            } => {
                let receiver = self
                    .definitions
                    .resolve_local_rank(comm, receiver_local_rank)?;
                if let Some(message) = self.desugarer.send(time, receiver, comm, tag, length) {
                    self.sent.push(message);
                }
            }
            EventRecord::MpiIsend {
                time,
                receiver_local_rank,
                comm,
                tag,
                length,
                request_id,
                ..
            } => {
                let receiver = self
                    .definitions
                    .resolve_local_rank(comm, receiver_local_rank)?;
                self.desugarer
                    .isend(time, receiver, comm, tag, length, request_id);
            }
            EventRecord::MpiIsendComplete { request_id, .. } => {
                let emitted = self
                    .desugarer
                    .isend_complete(request_id)
                    .map_err(MatchError::from)?;
                self.sent.extend(emitted);
            }

            EventRecord::MpiRecv {
                time,
                sender_local_rank,
                comm,
                tag,
                length,
                ..
            } => {
                let sender = self
                    .definitions
                    .resolve_local_rank(comm, sender_local_rank)?;
                if let Some(message) = self.desugarer.recv(time, sender, comm, tag, length) {
                    self.received.push(message);
                }
            }
            EventRecord::MpiIrecv {
                time,
                sender_local_rank,
                comm,
                tag,
                length,
                request_id,
                ..
            } => {
                let sender = self
                    .definitions
                    .resolve_local_rank(comm, sender_local_rank)?;
                let emitted = self
                    .desugarer
                    .irecv(time, sender, comm, tag, length, request_id)
                    .map_err(MatchError::from)?;
                self.received.extend(emitted);
            }
            EventRecord::MpiIrecvRequest { request_id, .. } => {
                self.desugarer.irecv_request(request_id);
            }
            EventRecord::MpiRequestCancelled { request_id, .. } => {
                match self
                    .desugarer
                    .request_cancelled(request_id)
                    .map_err(MatchError::from)?
                {
                    Cancelled::Send(messages) => self.sent.extend(messages),
                    Cancelled::Receive(messages) => self.received.extend(messages),
                    Cancelled::Neither => {}
                }
            }

            EventRecord::Otf2Enter { time, .. } | EventRecord::Otf2Leave { time, .. } => {
                self.note_time(time);
            }
        }
        Ok(())
    }
}

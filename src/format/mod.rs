//! C1: the format adapter (§4.1).
//!
//! The actual OTF1/OTF2 byte decoders are third-party C libraries
//! (`libotf`, `libotf2`) and are explicitly out of scope for this crate;
//! see [`otf1`]/[`otf2`] for the thin FFI glue that bridges their
//! callback ABI to the [`DefinitionSink`]/[`EventSink`] traits below,
//! which is what the rest of this crate is written against. Tests use
//! [`mock`] instead of linking the real libraries.

pub mod mock;
pub mod otf1;
pub mod otf2;

use std::path::{Path, PathBuf};

use crate::error::{Error, FormatError};
use crate::ids::{GroupRef, LocalRank, ProcessGroup, ProcessId, StringRef, Tag, Timestamp};

/// Which on-disk format a trace turned out to be, carried in the open
/// [`Handle`] so the rest of the loader knows which record shapes to
/// expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Otf1,
    Otf2,
}

/// OTF2 location type, as found on `DefLocation` records. Only the
/// metric/non-metric distinction matters to this crate (§4.2: "Location
/// records of type METRIC are skipped").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationType {
    Metric,
    Cpu,
    Gpu,
    Other,
}

/// OTF2 group type, as found on `DefGroup` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    CommLocations,
    Other,
}

/// OTF2 paradigm, as found on `DefGroup` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paradigm {
    Mpi,
    Other,
}

/// The definition records enumerated in §4.1, unified across both wire
/// formats. OTF1 only ever produces [`DefRecord::Otf1Process`]; OTF2
/// produces the other four.
#[derive(Debug, Clone)]
pub enum DefRecord {
    /// OTF1 `DefProcess`. `parent` is already translated from the wire
    /// sentinel (0) to `None`.
    Otf1Process {
        id: ProcessId,
        name: String,
        parent: Option<ProcessId>,
    },
    /// OTF2 `DefLocation`. `name` is a string *reference*, not yet
    /// resolved; `location_group` is carried verbatim for the eventual
    /// `"<string>:<location_group>"` display name.
    Otf2Location {
        location: ProcessId,
        name: StringRef,
        location_type: LocationType,
        location_group: u32,
    },
    Otf2String { reference: StringRef, value: String },
    Otf2Group {
        group: GroupRef,
        group_type: GroupType,
        paradigm: Paradigm,
        /// local rank -> world rank, in rank order.
        members: Vec<u64>,
    },
    Otf2Comm { comm: ProcessGroup, group: GroupRef },
}

/// The event records enumerated in §4.1.
#[derive(Debug, Clone)]
pub enum EventRecord {
    Otf1Send {
        time: Timestamp,
        sender: ProcessId,
        receiver: ProcessId,
        group: ProcessGroup,
        tag: Tag,
        length: crate::ids::Length,
    },
    Otf1Receive {
        time: Timestamp,
        receiver: ProcessId,
        sender: ProcessId,
        group: ProcessGroup,
        tag: Tag,
        length: crate::ids::Length,
    },
    Otf1Enter { time: Timestamp, process: ProcessId },
    Otf1Leave { time: Timestamp, process: ProcessId },

    MpiSend {
        sender: ProcessId,
        time: Timestamp,
        receiver_local_rank: LocalRank,
        comm: ProcessGroup,
        tag: Tag,
        length: crate::ids::Length,
    },
    MpiIsend {
        sender: ProcessId,
        time: Timestamp,
        receiver_local_rank: LocalRank,
        comm: ProcessGroup,
        tag: Tag,
        length: crate::ids::Length,
        request_id: u64,
    },
    MpiIsendComplete {
        sender: ProcessId,
        time: Timestamp,
        request_id: u64,
    },
    MpiRecv {
        receiver: ProcessId,
        time: Timestamp,
        sender_local_rank: LocalRank,
        comm: ProcessGroup,
        tag: Tag,
        length: crate::ids::Length,
    },
    MpiIrecv {
        receiver: ProcessId,
        time: Timestamp,
        sender_local_rank: LocalRank,
        comm: ProcessGroup,
        tag: Tag,
        length: crate::ids::Length,
        request_id: u64,
    },
    MpiIrecvRequest {
        receiver: ProcessId,
        time: Timestamp,
        request_id: u64,
    },
    MpiRequestCancelled {
        location: ProcessId,
        time: Timestamp,
        request_id: u64,
    },
    Otf2Enter { location: ProcessId, time: Timestamp },
    Otf2Leave { location: ProcessId, time: Timestamp },
}

impl EventRecord {
    /// The process/location this record originates from. A global OTF2
    /// reader can still surface events for locations other than the one
    /// just selected (§4.4: "the loader must tolerate events for other
    /// locations arriving through the global reader"); callers use this
    /// to attribute each record to its own location rather than whichever
    /// process is currently being loaded.
    pub fn location(&self) -> ProcessId {
        match self {
            EventRecord::Otf1Send { sender, .. } => *sender,
            EventRecord::Otf1Receive { receiver, .. } => *receiver,
            EventRecord::Otf1Enter { process, .. } => *process,
            EventRecord::Otf1Leave { process, .. } => *process,
            EventRecord::MpiSend { sender, .. } => *sender,
            EventRecord::MpiIsend { sender, .. } => *sender,
            EventRecord::MpiIsendComplete { sender, .. } => *sender,
            EventRecord::MpiRecv { receiver, .. } => *receiver,
            EventRecord::MpiIrecv { receiver, .. } => *receiver,
            EventRecord::MpiIrecvRequest { receiver, .. } => *receiver,
            EventRecord::MpiRequestCancelled { location, .. } => *location,
            EventRecord::Otf2Enter { location, .. } => *location,
            EventRecord::Otf2Leave { location, .. } => *location,
        }
    }
}

/// Fed definition records as the decoder produces them. Implemented by
/// [`crate::definitions::DefinitionContext`]; the adapter's job is only
/// to call these methods in wire order, not to interpret the records.
pub trait DefinitionSink {
    fn accept(&mut self, record: DefRecord) -> Result<(), Error>;
}

/// Fed event records as the decoder produces them. Implementations must
/// not assume every record belongs to whatever process was last selected
/// (§4.4) — use [`EventRecord::location`] to attribute each one.
pub trait EventSink {
    fn accept(&mut self, record: EventRecord) -> Result<(), Error>;
}

/// One open decoder handle, exclusively owned for the duration of a
/// single `open`/drop pair (§5: "the decoder handle is exclusively owned
/// by the loader ... no aliasing").
///
/// Every concrete backend releases its resources in `Drop`, modeling the
/// scoped acquisition the C++ original performed by hand via
/// `Otf_init`/`Otf_open`/`Otf_finalize`.
pub trait Backend {
    fn read_definitions(&mut self, sink: &mut dyn DefinitionSink) -> Result<(), Error>;

    /// Restrict the next `read_events` call to just this process/location.
    /// For OTF2 this also opens (and later closes) that location's local
    /// definition file, if present, so the backend can apply local ->
    /// global id remapping; its absence is not an error (§4.1). Each call
    /// starts selection over from a clean slate: a prior selection must
    /// not still be active when the new one is read.
    fn select_process(&mut self, process: ProcessId) -> Result<(), Error>;

    fn read_events(&mut self, sink: &mut dyn EventSink) -> Result<(), Error>;
}

/// Opens `path`, detecting the format by attempting OTF1 first and OTF2
/// second (§4.1). Fails with [`FormatError::InvalidTrace`] if neither
/// decoder accepts the file.
pub fn open(path: &Path) -> Result<(TraceFormat, Box<dyn Backend>), FormatError> {
    if let Some(backend) = otf1::Otf1Backend::try_open(path)? {
        return Ok((TraceFormat::Otf1, Box::new(backend)));
    }
    if let Some(backend) = otf2::Otf2Backend::try_open(path)? {
        return Ok((TraceFormat::Otf2, Box::new(backend)));
    }
    Err(FormatError::InvalidTrace(PathBuf::from(path)))
}

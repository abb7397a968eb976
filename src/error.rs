//! Error aggregation for the ingestion engine.
//!
//! Mirrors the teacher's `recovery::RecoveryError` / `main::RTICScopeError`
//! split: every module gets its own `thiserror::Error` enum, and
//! [`Error`] gathers them behind `#[error(transparent)]` so a caller only
//! has to match on one type at the boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::{GroupRef, ProcessGroup, ProcessId};

/// Renders extra hints alongside a rendered error, same contract as the
/// teacher's `diag::DiagnosableError`.
pub trait DiagnosableError {
    fn diagnose(&self) -> Vec<String> {
        vec![]
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("could not open \"{0}\" as OTF1 or OTF2")]
    InvalidTrace(PathBuf),
    #[error("decoder failed to read {what}: {reason}")]
    DecodeFailed { what: &'static str, reason: String },
}

impl DiagnosableError for FormatError {
    fn diagnose(&self) -> Vec<String> {
        match self {
            FormatError::InvalidTrace(_) => vec![
                "the path must be an OTF1 master-trace file or an OTF2 anchor file".to_string(),
            ],
            _ => vec![],
        }
    }
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("process {0} has already been defined")]
    DuplicateProcess(ProcessId),
    #[error("string {0} has already been defined")]
    DuplicateString(u32),
    #[error("group {0} has already been defined")]
    DuplicateGroup(u32),
    #[error("synthesized parent {parent} of process {child} does not exist")]
    UnknownParent { child: ProcessId, parent: ProcessId },
    #[error("more than one group is flagged as the MPI COMM_LOCATIONS group")]
    MultipleMpiLocationGroups,
    #[error("communicator {comm} references undefined group {group:?}")]
    UndefinedGroup { comm: ProcessGroup, group: GroupRef },
    #[error("events for process {0} have not been loaded")]
    EventsNotLoaded(ProcessId),
    #[error("definitions have not been loaded")]
    DefinitionsNotLoaded,
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl DiagnosableError for DefinitionError {
    fn diagnose(&self) -> Vec<String> {
        match self {
            DefinitionError::UnknownParent { .. } => vec![
                "OTF2 parents are synthesized from the low 32 bits of the location id; this is a Score-P-specific convention and not a general OTF2 guarantee".to_string(),
            ],
            _ => vec![],
        }
    }
}

#[derive(Debug, Error)]
pub enum DesugarError {
    #[error("request {0} completed/cancelled but was never issued")]
    UnknownRequest(u64),
    #[error("request {0} matches both an outstanding isend and an outstanding irecv request")]
    AmbiguousCancellation(u64),
}

impl DiagnosableError for DesugarError {}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("(comm {comm}, local rank {local_rank}) has no resolved location")]
    MissingResolution {
        comm: ProcessGroup,
        local_rank: u32,
    },
    #[error("{0} receive(s) remain unmatched after matching; traces must not contain a receive with no corresponding send")]
    OrphanReceives(usize),
    #[error(transparent)]
    Desugar(#[from] DesugarError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

impl DiagnosableError for MatchError {
    fn diagnose(&self) -> Vec<String> {
        match self {
            MatchError::OrphanReceives(_) => vec![
                "this indicates a malformed or truncated trace; every receive is expected to have a matching send".to_string(),
            ],
            _ => vec![],
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

impl DiagnosableError for Error {
    fn diagnose(&self) -> Vec<String> {
        match self {
            Error::Format(e) => e.diagnose(),
            Error::Definition(e) => e.diagnose(),
            Error::Match(e) => e.diagnose(),
        }
    }
}

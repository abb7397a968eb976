//! Ingests OTF1/OTF2 MPI execution traces and produces a process
//! hierarchy with matched send/receive [`Message`]s.
//!
//! The on-disk format is auto-detected ([`format::open`]); callers only
//! ever see [`ProcessId`]-keyed processes and [`Message`] lists, whether
//! the underlying trace was a legacy per-process OTF1 stream or a
//! unified OTF2 event stream with non-blocking MPI calls desugared into
//! blocking-style sends and receives.
//!
//! ```no_run
//! use std::path::Path;
//! use otf_trace::RawTrace;
//!
//! let mut raw = RawTrace::open(Path::new("trace.otf2"))?;
//! raw.load_all_events()?;
//! let trace = raw.to_trace()?;
//! for &process in trace.ordered_processes() {
//!     println!("{}: {} message(s)", process, trace.messages(process).len());
//! }
//! # Ok::<(), otf_trace::Error>(())
//! ```

pub mod definitions;
pub mod desugar;
pub mod error;
pub mod format;
pub mod ids;
pub mod log;
pub mod rawtrace;
pub mod trace;

pub use error::Error;
pub use format::TraceFormat;
pub use ids::{Length, ProcessGroup, ProcessId, Tag, Timestamp};
pub use rawtrace::RawTrace;
pub use trace::{Message, Trace};

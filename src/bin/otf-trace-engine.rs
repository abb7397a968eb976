//! Thin CLI driver (§6): opens a trace, loads everything, prints a
//! one-line summary per process. Errors abort with a non-zero exit
//! code, matching the original's "could not open ... aborting" policy
//! at the process boundary — the library itself never calls `exit`.

use std::env;
use std::path::PathBuf;
use std::process;

use otf_trace::error::DiagnosableError;
use otf_trace::log;
use otf_trace::RawTrace;

fn main() {
    if let Err(e) = main_try() {
        log::err(e.to_string());
        for hint in e.diagnose() {
            log::hint(hint);
        }
        process::exit(1);
    }
}

fn main_try() -> Result<(), otf_trace::Error> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            eprintln!("usage: otf-trace-engine <trace-file>");
            process::exit(2);
        });

    let mut raw = RawTrace::open(&path)?;
    log::status("Opened", format!("{} as {:?}", path.display(), raw.format()));

    raw.load_all_events()?;
    let trace = raw.to_trace()?;

    for &process in trace.ordered_processes() {
        let name = trace.name(process).unwrap_or("<unnamed>");
        let messages = trace.messages(process).len();
        log::status("Process", format!("{} ({}): {} sent message(s)", process, name, messages));
    }

    Ok(())
}

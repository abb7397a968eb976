//! C6: ordering and send/receive matching (§4.6), plus the final
//! immutable [`Trace`] that is this crate's product.

use std::collections::{HashMap, VecDeque};

use crate::desugar::{ReceivedMessage, SentMessage};
use crate::error::MatchError;
use crate::ids::{Length, MatchKey, ProcessId, Timestamp};
use crate::log;
use crate::rawtrace::RawTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub time: Timestamp,
    pub duration: Timestamp,
    pub receiver: ProcessId,
    pub length: Length,
}

#[derive(Debug, Clone)]
pub struct Trace {
    begin_time: Timestamp,
    end_time: Timestamp,
    processes: Vec<ProcessId>,
    process_names: HashMap<ProcessId, String>,
    messages: HashMap<ProcessId, Vec<Message>>,
}

impl Trace {
    pub fn begin_time(&self) -> Timestamp {
        self.begin_time
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    /// Processes in hierarchical DFS-preorder (§4.6): a parent always
    /// precedes its children, siblings ascend by id.
    pub fn ordered_processes(&self) -> &[ProcessId] {
        &self.processes
    }

    pub fn name(&self, process: ProcessId) -> Option<&str> {
        self.process_names.get(&process).map(String::as_str)
    }

    pub fn messages(&self, sender: ProcessId) -> &[Message] {
        self.messages
            .get(&sender)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Orders the processes of `raw` into a DFS preorder, tolerant of
/// non-tree parent edges (a process with no recorded parent, or whose
/// parent link doesn't appear as a root itself, still gets added once
/// every other root has been walked).
fn order_processes(raw: &RawTrace) -> Result<Vec<ProcessId>, MatchError> {
    let all_processes = raw.processes()?;

    let mut children: HashMap<ProcessId, Vec<ProcessId>> = HashMap::new();
    for &process in &all_processes {
        if let Some(parent) = raw.definitions().parent(process) {
            children.entry(parent).or_default().push(process);
        }
    }
    for list in children.values_mut() {
        list.sort();
    }

    let mut sorted_processes = all_processes;
    sorted_processes.sort();

    let mut ordered = Vec::with_capacity(sorted_processes.len());
    let mut added = std::collections::HashSet::new();

    fn recurse(
        parent: ProcessId,
        sorted_processes: &[ProcessId],
        children: &HashMap<ProcessId, Vec<ProcessId>>,
        added: &mut std::collections::HashSet<ProcessId>,
        ordered: &mut Vec<ProcessId>,
    ) {
        let Some(siblings) = children.get(&parent) else {
            return;
        };
        for &p in sorted_processes {
            if added.contains(&p) || !siblings.contains(&p) {
                continue;
            }
            ordered.push(p);
            added.insert(p);
            recurse(p, sorted_processes, children, added, ordered);
        }
    }

    for &p in &sorted_processes {
        if added.contains(&p) {
            continue;
        }
        ordered.push(p);
        added.insert(p);
        recurse(p, &sorted_processes, &children, &mut added, &mut ordered);
    }

    Ok(ordered)
}

/// Matches every sent message to the head of its key's receive queue
/// (§4.6). Unmatched sends are reported as warnings and dropped;
/// leftover receives after all sends are matched is a hard error, since
/// a receive with no corresponding send cannot occur in a well-formed
/// trace.
pub fn build_trace(raw: &RawTrace) -> Result<Trace, MatchError> {
    let processes = order_processes(raw)?;

    let mut receive_queues: HashMap<MatchKey, VecDeque<ReceivedMessage>> = HashMap::new();
    for &receiver in &processes {
        for r in raw.received_messages(receiver) {
            let key = MatchKey {
                sender: r.sender,
                receiver,
                group: r.group,
                tag: r.tag,
            };
            receive_queues.entry(key).or_default().push_back(*r);
        }
    }

    let mut messages: HashMap<ProcessId, Vec<Message>> = HashMap::new();
    let mut missing: HashMap<MatchKey, usize> = HashMap::new();

    for &sender in &processes {
        let sent = messages.entry(sender).or_default();

        for s in raw.sent_messages(sender) {
            let key = MatchKey {
                sender,
                receiver: s.receiver,
                group: s.group,
                tag: s.tag,
            };

            match receive_queues.get_mut(&key) {
                Some(queue) if !queue.is_empty() => {
                    let r = queue.pop_front().unwrap();
                    sent.push(Message {
                        time: s.time,
                        duration: r.time - s.time,
                        receiver: s.receiver,
                        length: s.length,
                    });

                    if s.time > r.time {
                        log::warn(format!(
                            "send (process {}) did not start before receive (process {}). delta is {} ticks.",
                            sender,
                            s.receiver,
                            r.time - s.time
                        ));
                    }
                    if s.length > r.length {
                        log::warn(format!(
                            "receiver (process {}) receives fewer bytes than sent (process {}). {} > {}",
                            s.receiver, sender, s.length, r.length
                        ));
                    }

                    if queue.is_empty() {
                        receive_queues.remove(&key);
                    }
                }
                _ => {
                    *missing.entry(key).or_insert(0) += 1;
                }
            }
        }
    }

    for (key, count) in &missing {
        log::warn(format!(
            "key: \"{}\" has {} missing receives.",
            key, count
        ));
    }

    if !receive_queues.is_empty() {
        let leftover: usize = receive_queues.values().map(VecDeque::len).sum();
        return Err(MatchError::OrphanReceives(leftover));
    }

    Ok(Trace {
        begin_time: raw.begin_time()?,
        end_time: raw.end_time()?,
        process_names: processes
            .iter()
            .filter_map(|&p| raw.definitions().name(p).map(|n| (p, n.to_string())))
            .collect(),
        processes,
        messages,
    })
}

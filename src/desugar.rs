//! C3: the non-blocking desugarer (§4.3).
//!
//! Turns MPI's non-blocking point-to-point calls (`Isend`/`Irecv` plus
//! their completions and cancellations) into ordinary blocking-style
//! send/receive records, one [`Desugarer`] per process. Isends and
//! ireceive requests form two independent FIFOs; only the head of each
//! queue may be emitted. A later op in the same queue is appended to the
//! *predecessor's* blocked list rather than emitted directly, so issue
//! order survives however out-of-order the completions arrive.

use std::collections::VecDeque;

use crate::error::DesugarError;
use crate::ids::{Length, ProcessGroup, ProcessId, Tag, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub time: Timestamp,
    pub receiver: ProcessId,
    pub group: ProcessGroup,
    pub length: Length,
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub time: Timestamp,
    pub sender: ProcessId,
    pub group: ProcessGroup,
    pub length: Length,
    pub tag: Tag,
}

struct Isend {
    message: SentMessage,
    request_id: u64,
    blocked: VecDeque<SentMessage>,
}

struct IrecvRequest {
    request_id: u64,
    blocked: VecDeque<ReceivedMessage>,
}

/// What a cancellation turned out to cancel, per §4.3's "a request
/// belongs to exactly one of the two queues" invariant.
pub enum Cancelled {
    Send(Vec<SentMessage>),
    Receive(Vec<ReceivedMessage>),
    /// Neither queue held the request. Scored traces can legitimately emit
    /// this for requests the desugarer never tracked.
    Neither,
}

#[derive(Default)]
pub struct Desugarer {
    isends: VecDeque<Isend>,
    irecv_requests: VecDeque<IrecvRequest>,
}

impl Desugarer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocking `MPI_Send`. Emitted immediately unless an outstanding
    /// isend on this process is still unresolved, in which case it's
    /// withheld behind it.
    pub fn send(
        &mut self,
        time: Timestamp,
        receiver: ProcessId,
        group: ProcessGroup,
        tag: Tag,
        length: Length,
    ) -> Option<SentMessage> {
        let message = SentMessage {
            time,
            receiver,
            group,
            length,
            tag,
        };
        match self.isends.back_mut() {
            Some(last) => {
                last.blocked.push_back(message);
                None
            }
            None => Some(message),
        }
    }

    pub fn isend(
        &mut self,
        time: Timestamp,
        receiver: ProcessId,
        group: ProcessGroup,
        tag: Tag,
        length: Length,
        request_id: u64,
    ) {
        self.isends.push_back(Isend {
            message: SentMessage {
                time,
                receiver,
                group,
                length,
                tag,
            },
            request_id,
            blocked: VecDeque::new(),
        });
    }

    pub fn isend_complete(&mut self, request_id: u64) -> Result<Vec<SentMessage>, DesugarError> {
        let index = self
            .isends
            .iter()
            .position(|s| s.request_id == request_id)
            .ok_or(DesugarError::UnknownRequest(request_id))?;

        if index == 0 {
            let head = self.isends.pop_front().unwrap();
            let mut emitted = Vec::with_capacity(1 + head.blocked.len());
            emitted.push(head.message);
            emitted.extend(head.blocked);
            Ok(emitted)
        } else {
            let head = self.isends.remove(index).unwrap();
            let predecessor = &mut self.isends[index - 1];
            predecessor.blocked.push_back(head.message);
            predecessor.blocked.extend(head.blocked);
            Ok(Vec::new())
        }
    }

    /// Blocking `MPI_Recv`, same withholding rule as [`Desugarer::send`]
    /// but against the ireceive-request queue.
    pub fn recv(
        &mut self,
        time: Timestamp,
        sender: ProcessId,
        group: ProcessGroup,
        tag: Tag,
        length: Length,
    ) -> Option<ReceivedMessage> {
        let message = ReceivedMessage {
            time,
            sender,
            group,
            length,
            tag,
        };
        match self.irecv_requests.back_mut() {
            Some(last) => {
                last.blocked.push_back(message);
                None
            }
            None => Some(message),
        }
    }

    pub fn irecv_request(&mut self, request_id: u64) {
        self.irecv_requests.push_back(IrecvRequest {
            request_id,
            blocked: VecDeque::new(),
        });
    }

    /// The irecv completion carries the message's own fields (time,
    /// sender, group, tag, length) directly; unlike [`Isend`], the
    /// tracked [`IrecvRequest`] holds only the request id and whatever
    /// got blocked behind it.
    pub fn irecv(
        &mut self,
        time: Timestamp,
        sender: ProcessId,
        group: ProcessGroup,
        tag: Tag,
        length: Length,
        request_id: u64,
    ) -> Result<Vec<ReceivedMessage>, DesugarError> {
        let index = self
            .irecv_requests
            .iter()
            .position(|r| r.request_id == request_id)
            .ok_or(DesugarError::UnknownRequest(request_id))?;

        let message = ReceivedMessage {
            time,
            sender,
            group,
            length,
            tag,
        };

        if index == 0 {
            let head = self.irecv_requests.pop_front().unwrap();
            let mut emitted = Vec::with_capacity(1 + head.blocked.len());
            emitted.push(message);
            emitted.extend(head.blocked);
            Ok(emitted)
        } else {
            let head = self.irecv_requests.remove(index).unwrap();
            let predecessor = &mut self.irecv_requests[index - 1];
            predecessor.blocked.push_back(message);
            predecessor.blocked.extend(head.blocked);
            Ok(Vec::new())
        }
    }

    pub fn request_cancelled(&mut self, request_id: u64) -> Result<Cancelled, DesugarError> {
        let irecv_index = self
            .irecv_requests
            .iter()
            .position(|r| r.request_id == request_id);
        let isend_index = self.isends.iter().position(|s| s.request_id == request_id);

        if irecv_index.is_some() && isend_index.is_some() {
            return Err(DesugarError::AmbiguousCancellation(request_id));
        }

        if let Some(index) = irecv_index {
            if index == 0 {
                let head = self.irecv_requests.pop_front().unwrap();
                Ok(Cancelled::Receive(head.blocked.into_iter().collect()))
            } else {
                let head = self.irecv_requests.remove(index).unwrap();
                self.irecv_requests[index - 1].blocked.extend(head.blocked);
                Ok(Cancelled::Receive(Vec::new()))
            }
        } else if let Some(index) = isend_index {
            if index == 0 {
                let head = self.isends.pop_front().unwrap();
                Ok(Cancelled::Send(head.blocked.into_iter().collect()))
            } else {
                let head = self.isends.remove(index).unwrap();
                self.isends[index - 1].blocked.extend(head.blocked);
                Ok(Cancelled::Send(Vec::new()))
            }
        } else {
            Ok(Cancelled::Neither)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn msg(t: i64, receiver: i64) -> (Timestamp, ProcessId, ProcessGroup, Tag, Length) {
        (
            Timestamp(t),
            ProcessId(receiver),
            ProcessGroup(0),
            Tag(0),
            Length(4),
        )
    }

    #[test]
    fn isend_without_predecessor_emits_on_completion() {
        let mut d = Desugarer::new();
        let (t, r, g, tag, l) = msg(1, 2);
        d.isend(t, r, g, tag, l, 42);
        let emitted = d.isend_complete(42).unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].receiver, ProcessId(2));
    }

    #[test]
    fn completion_out_of_order_defers_to_predecessor() {
        let mut d = Desugarer::new();
        let (t1, r1, g, tag, l) = msg(1, 2);
        let (t2, r2, ..) = msg(2, 3);
        d.isend(t1, r1, g, tag, l, 1);
        d.isend(t2, r2, g, tag, l, 2);

        // completing the second (non-head) isend first must not emit yet
        assert!(d.isend_complete(2).unwrap().is_empty());
        // completing the head now emits both, in issue order
        let emitted = d.isend_complete(1).unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].receiver, ProcessId(2));
        assert_eq!(emitted[1].receiver, ProcessId(3));
    }

    #[test]
    fn unknown_completion_is_an_error() {
        let mut d = Desugarer::new();
        assert!(d.isend_complete(999).is_err());
    }

    #[test]
    fn send_blocks_behind_outstanding_isend() {
        let mut d = Desugarer::new();
        let (t, r, g, tag, l) = msg(1, 2);
        d.isend(t, r, g, tag, l, 1);
        let (t2, r2, ..) = msg(2, 9);
        assert!(d.send(t2, r2, g, tag, l).is_none());
        let emitted = d.isend_complete(1).unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[1].receiver, ProcessId(9));
    }

    #[test]
    fn cancelling_head_irecv_request_releases_blocked_queue_without_a_message_of_its_own() {
        let mut d = Desugarer::new();
        d.irecv_request(1);
        d.irecv(Timestamp(5), ProcessId(3), ProcessGroup(0), Tag(0), Length(1), 2)
            .unwrap_err(); // request 2 was never issued
        let cancelled = d.request_cancelled(1).unwrap();
        match cancelled {
            Cancelled::Receive(messages) => assert!(messages.is_empty()),
            _ => panic!("expected a cancelled receive"),
        }
    }
}

//! Black-box scenario tests against the mock format backend: process
//! hierarchy ordering, blocking and non-blocking message matching, and
//! the unmatched-send/unmatched-receive error policies.

use otf_trace::error::Error;
use otf_trace::format::mock::{MockBackend, MockTrace};
use otf_trace::format::{DefRecord, EventRecord, GroupType, LocationType, Paradigm, TraceFormat};
use otf_trace::ids::{GroupRef, Length, LocalRank, ProcessGroup, ProcessId, StringRef, Tag, Timestamp};
use otf_trace::RawTrace;

fn open(trace: MockTrace) -> RawTrace {
    RawTrace::from_backend(TraceFormat::Otf2, Box::new(MockBackend::new(trace)))
}

/// S1: a plain OTF1 send matches a plain OTF1 receive on the same key.
#[test]
fn s1_otf1_blocking_send_matches_receive() {
    let sender = ProcessId(1);
    let receiver = ProcessId(2);

    let trace = MockTrace::new()
        .define(DefRecord::Otf1Process {
            id: sender,
            name: "rank0".to_string(),
            parent: None,
        })
        .define(DefRecord::Otf1Process {
            id: receiver,
            name: "rank1".to_string(),
            parent: None,
        })
        .event(
            sender,
            EventRecord::Otf1Send {
                time: Timestamp(10),
                sender,
                receiver,
                group: ProcessGroup(0),
                tag: Tag(1),
                length: Length(64),
            },
        )
        .event(
            receiver,
            EventRecord::Otf1Receive {
                time: Timestamp(15),
                receiver,
                sender,
                group: ProcessGroup(0),
                tag: Tag(1),
                length: Length(64),
            },
        );

    let mut raw = RawTrace::from_backend(TraceFormat::Otf1, Box::new(MockBackend::new(trace)));
    raw.load_all_events().unwrap();
    let built = raw.to_trace().unwrap();

    let messages = built.messages(sender);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].time, Timestamp(10));
    assert_eq!(messages[0].duration, Timestamp(5));
    assert_eq!(messages[0].receiver, receiver);
}

fn two_rank_world() -> MockTrace {
    MockTrace::new()
        .define(DefRecord::Otf2String {
            reference: StringRef(0),
            value: "rank".to_string(),
        })
        .define(DefRecord::Otf2Location {
            location: ProcessId(0),
            name: StringRef(0),
            location_type: LocationType::Cpu,
            location_group: 0,
        })
        .define(DefRecord::Otf2Location {
            location: ProcessId(1),
            name: StringRef(0),
            location_type: LocationType::Cpu,
            location_group: 1,
        })
        .define(DefRecord::Otf2Group {
            group: GroupRef(0),
            group_type: GroupType::CommLocations,
            paradigm: Paradigm::Mpi,
            members: vec![0, 1],
        })
        .define(DefRecord::Otf2Group {
            group: GroupRef(1),
            group_type: GroupType::Other,
            paradigm: Paradigm::Other,
            members: vec![0, 1],
        })
        .define(DefRecord::Otf2Comm {
            comm: ProcessGroup(100),
            group: GroupRef(1),
        })
}

/// S2: an OTF2 blocking `MpiSend`/`MpiRecv` pair matches once local
/// ranks are resolved through the COMM_LOCATIONS group.
#[test]
fn s2_otf2_blocking_mpi_send_matches_recv_via_local_rank() {
    let trace = two_rank_world()
        .event(
            ProcessId(0),
            EventRecord::MpiSend {
                sender: ProcessId(0),
                time: Timestamp(100),
                receiver_local_rank: LocalRank(1),
                comm: ProcessGroup(100),
                tag: Tag(7),
                length: Length(32),
            },
        )
        .event(
            ProcessId(1),
            EventRecord::MpiRecv {
                receiver: ProcessId(1),
                time: Timestamp(120),
                sender_local_rank: LocalRank(0),
                comm: ProcessGroup(100),
                tag: Tag(7),
                length: Length(32),
            },
        );

    let mut raw = open(trace);
    raw.load_all_events().unwrap();
    let built = raw.to_trace().unwrap();

    let messages = built.messages(ProcessId(0));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].receiver, ProcessId(1));
    assert_eq!(messages[0].duration, Timestamp(20));
}

/// S3: two isends complete out of issue order; the desugarer still
/// emits them in issue order, and both match their (plain, blocking)
/// receives.
#[test]
fn s3_out_of_order_isend_completion_preserves_issue_order() {
    let trace = two_rank_world()
        .event(
            ProcessId(0),
            EventRecord::MpiIsend {
                sender: ProcessId(0),
                time: Timestamp(10),
                receiver_local_rank: LocalRank(1),
                comm: ProcessGroup(100),
                tag: Tag(1),
                length: Length(8),
                request_id: 1,
            },
        )
        .event(
            ProcessId(0),
            EventRecord::MpiIsend {
                sender: ProcessId(0),
                time: Timestamp(20),
                receiver_local_rank: LocalRank(1),
                comm: ProcessGroup(100),
                tag: Tag(2),
                length: Length(8),
                request_id: 2,
            },
        )
        // request 2 completes first; must not be emitted until request 1 does.
        .event(
            ProcessId(0),
            EventRecord::MpiIsendComplete {
                sender: ProcessId(0),
                time: Timestamp(25),
                request_id: 2,
            },
        )
        .event(
            ProcessId(0),
            EventRecord::MpiIsendComplete {
                sender: ProcessId(0),
                time: Timestamp(30),
                request_id: 1,
            },
        )
        .event(
            ProcessId(1),
            EventRecord::MpiRecv {
                receiver: ProcessId(1),
                time: Timestamp(40),
                sender_local_rank: LocalRank(0),
                comm: ProcessGroup(100),
                tag: Tag(1),
                length: Length(8),
            },
        )
        .event(
            ProcessId(1),
            EventRecord::MpiRecv {
                receiver: ProcessId(1),
                time: Timestamp(50),
                sender_local_rank: LocalRank(0),
                comm: ProcessGroup(100),
                tag: Tag(2),
                length: Length(8),
            },
        );

    let mut raw = open(trace);
    raw.load_all_events().unwrap();
    let built = raw.to_trace().unwrap();

    let messages = built.messages(ProcessId(0));
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].time, Timestamp(10));
    assert_eq!(messages[1].time, Timestamp(20));
}

/// S4: a receive with no corresponding send is a hard error.
#[test]
fn s4_orphan_receive_is_a_hard_error() {
    let trace = two_rank_world().event(
        ProcessId(1),
        EventRecord::MpiRecv {
            receiver: ProcessId(1),
            time: Timestamp(5),
            sender_local_rank: LocalRank(0),
            comm: ProcessGroup(100),
            tag: Tag(9),
            length: Length(8),
        },
    );

    let mut raw = open(trace);
    raw.load_all_events().unwrap();
    match raw.to_trace() {
        Err(Error::Match(otf_trace::error::MatchError::OrphanReceives(count))) => {
            assert_eq!(count, 1)
        }
        other => panic!("expected OrphanReceives, got {:?}", other.map(|_| ())),
    }
}

/// S5: a send with no corresponding receive is dropped with only a
/// warning; it must not abort matching.
#[test]
fn s5_unmatched_send_is_non_fatal() {
    let trace = two_rank_world().event(
        ProcessId(0),
        EventRecord::MpiSend {
            sender: ProcessId(0),
            time: Timestamp(5),
            receiver_local_rank: LocalRank(1),
            comm: ProcessGroup(100),
            tag: Tag(9),
            length: Length(8),
        },
    );

    let mut raw = open(trace);
    raw.load_all_events().unwrap();
    let built = raw.to_trace().unwrap();
    assert!(built.messages(ProcessId(0)).is_empty());
}

/// S6: OTF1 process hierarchy is ordered parent-before-children,
/// siblings ascending by id.
#[test]
fn s6_hierarchy_is_dfs_preorder_with_ascending_siblings() {
    let trace = MockTrace::new()
        .define(DefRecord::Otf1Process {
            id: ProcessId(1),
            name: "root".to_string(),
            parent: None,
        })
        .define(DefRecord::Otf1Process {
            id: ProcessId(2),
            name: "child-a".to_string(),
            parent: Some(ProcessId(1)),
        })
        .define(DefRecord::Otf1Process {
            id: ProcessId(3),
            name: "child-b".to_string(),
            parent: Some(ProcessId(1)),
        })
        .define(DefRecord::Otf1Process {
            id: ProcessId(4),
            name: "grandchild".to_string(),
            parent: Some(ProcessId(2)),
        });

    let mut raw = RawTrace::from_backend(TraceFormat::Otf1, Box::new(MockBackend::new(trace)));
    raw.load_all_events().unwrap();
    let built = raw.to_trace().unwrap();

    assert_eq!(
        built.ordered_processes(),
        &[ProcessId(1), ProcessId(2), ProcessId(4), ProcessId(3)]
    );
}

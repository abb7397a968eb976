//! C2: definition loading (§4.2).
//!
//! Collects process/location, string, group and communicator
//! definitions as the format adapter streams them in, then resolves the
//! deferred bits — OTF2 display names and local-rank-to-location
//! mappings — once the stream is exhausted.

use std::collections::{HashMap, HashSet};

use crate::error::{DefinitionError, Error, MatchError};
use crate::format::{DefRecord, DefinitionSink, GroupType, LocationType, Paradigm};
use crate::ids::{GroupRef, LocalRank, ProcessGroup, ProcessId, StringRef};

/// OTF2 defers a location's display name to a later string definition;
/// this is what's pending until [`DefinitionContext::finalize`] resolves
/// it against the accumulated string table.
struct PendingOtf2Name {
    name: StringRef,
    location_group: u32,
}

#[derive(Default)]
pub struct DefinitionContext {
    processes: HashSet<ProcessId>,
    process_names: HashMap<ProcessId, String>,
    process_parents: HashMap<ProcessId, ProcessId>,
    pending_otf2_names: HashMap<ProcessId, PendingOtf2Name>,

    strings: HashMap<StringRef, String>,
    communicator_to_group: HashMap<ProcessGroup, GroupRef>,
    local_rank_to_global_rank: HashMap<GroupRef, HashMap<u32, u64>>,
    mpi_location_group: Option<GroupRef>,

    local_rank_to_location: HashMap<(ProcessGroup, u32), ProcessId>,
    finalized: bool,
}

impl DefinitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_process(
        &mut self,
        id: ProcessId,
        name: String,
        parent: Option<ProcessId>,
    ) -> Result<(), DefinitionError> {
        if self.process_names.contains_key(&id) {
            return Err(DefinitionError::DuplicateProcess(id));
        }
        self.process_names.insert(id, name);
        self.processes.insert(id);
        if let Some(parent) = parent {
            self.process_parents.insert(id, parent);
        }
        Ok(())
    }

    /// Resolves parent synthesis, OTF2 display names and the
    /// local-rank-to-location mapping. Must be called exactly once,
    /// after the format adapter's last definition has been accepted and
    /// before any lookup method is used.
    pub fn finalize(&mut self) -> Result<(), DefinitionError> {
        for (id, pending) in self.pending_otf2_names.drain() {
            let string = self
                .strings
                .get(&pending.name)
                .cloned()
                .unwrap_or_default();
            self.process_names
                .insert(id, format!("{}:{}", string, pending.location_group));
        }

        for (&child, &parent) in &self.process_parents {
            if !self.processes.contains(&parent) {
                return Err(DefinitionError::UnknownParent { child, parent });
            }
        }

        if let Some(location_group) = self.mpi_location_group {
            let location_members = self
                .local_rank_to_global_rank
                .get(&location_group)
                .cloned()
                .unwrap_or_default();

            for (&comm, group) in &self.communicator_to_group {
                let local_ranks = self.local_rank_to_global_rank.get(group).ok_or(
                    DefinitionError::UndefinedGroup { comm, group: *group },
                )?;
                for (&local_rank, &global_rank) in local_ranks {
                    if let Some(&location) = location_members.get(&(global_rank as u32)) {
                        self.local_rank_to_location
                            .insert((comm, local_rank), ProcessId(location as i64));
                    }
                    // global_rank not present among COMM_LOCATIONS members:
                    // a non-MPI rank (e.g. an OpenMP thread group); no mapping.
                }
            }
        }

        self.finalized = true;
        Ok(())
    }

    pub fn processes(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.iter().copied()
    }

    pub fn name(&self, process: ProcessId) -> Option<&str> {
        self.process_names.get(&process).map(String::as_str)
    }

    pub fn parent(&self, process: ProcessId) -> Option<ProcessId> {
        self.process_parents.get(&process).copied()
    }

    pub fn resolve_local_rank(
        &self,
        comm: ProcessGroup,
        local_rank: LocalRank,
    ) -> Result<ProcessId, MatchError> {
        self.local_rank_to_location
            .get(&(comm, local_rank.0))
            .copied()
            .ok_or(MatchError::MissingResolution {
                comm,
                local_rank: local_rank.0,
            })
    }
}

impl DefinitionSink for DefinitionContext {
    fn accept(&mut self, record: DefRecord) -> Result<(), Error> {
        match record {
            DefRecord::Otf1Process { id, name, parent } => {
                self.insert_process(id, name, parent)?;
            }
            DefRecord::Otf2Location {
                location,
                name,
                location_type,
                location_group,
            } => {
                if matches!(location_type, LocationType::Metric) {
                    return Ok(());
                }
                let parent = if (location.0 as u64 & 0xffff_ffff) == location.0 as u64 {
                    None
                } else {
                    Some(ProcessId((location.0 as u64 & 0xffff_ffff) as i64))
                };
                // Name resolution deferred until `finalize`.
                self.insert_process(location, String::new(), parent)?;
                self.pending_otf2_names.insert(
                    location,
                    PendingOtf2Name {
                        name,
                        location_group,
                    },
                );
            }
            DefRecord::Otf2String { reference, value } => {
                if self.strings.contains_key(&reference) {
                    return Err(DefinitionError::DuplicateString(reference.0).into());
                }
                self.strings.insert(reference, value);
            }
            DefRecord::Otf2Group {
                group,
                group_type,
                paradigm,
                members,
            } => {
                if self.local_rank_to_global_rank.contains_key(&group) {
                    return Err(DefinitionError::DuplicateGroup(group.0).into());
                }
                let ranks = members
                    .into_iter()
                    .enumerate()
                    .map(|(rank, member)| (rank as u32, member))
                    .collect();
                self.local_rank_to_global_rank.insert(group, ranks);

                if matches!(group_type, GroupType::CommLocations) && matches!(paradigm, Paradigm::Mpi)
                {
                    if self.mpi_location_group.is_some() {
                        return Err(DefinitionError::MultipleMpiLocationGroups.into());
                    }
                    self.mpi_location_group = Some(group);
                }
            }
            DefRecord::Otf2Comm { comm, group } => {
                self.communicator_to_group.insert(comm, group);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_process_is_rejected() {
        let mut ctx = DefinitionContext::new();
        ctx.accept(DefRecord::Otf1Process {
            id: ProcessId(1),
            name: "a".to_string(),
            parent: None,
        })
        .unwrap();
        let err = ctx.accept(DefRecord::Otf1Process {
            id: ProcessId(1),
            name: "b".to_string(),
            parent: None,
        });
        assert!(err.is_err());
    }

    #[test]
    fn otf2_parent_synthesis_uses_low_32_bits() {
        let mut ctx = DefinitionContext::new();
        ctx.accept(DefRecord::Otf2Location {
            location: ProcessId(0x1),
            name: StringRef(0),
            location_type: LocationType::Cpu,
            location_group: 0,
        })
        .unwrap();
        ctx.accept(DefRecord::Otf2Location {
            location: ProcessId(0x1_0000_0001),
            name: StringRef(0),
            location_type: LocationType::Cpu,
            location_group: 0,
        })
        .unwrap();
        ctx.finalize().unwrap();
        assert_eq!(ctx.parent(ProcessId(0x1_0000_0001)), Some(ProcessId(0x1)));
        assert_eq!(ctx.parent(ProcessId(0x1)), None);
    }

    #[test]
    fn metric_locations_are_skipped() {
        let mut ctx = DefinitionContext::new();
        ctx.accept(DefRecord::Otf2Location {
            location: ProcessId(7),
            name: StringRef(0),
            location_type: LocationType::Metric,
            location_group: 0,
        })
        .unwrap();
        ctx.finalize().unwrap();
        assert_eq!(ctx.processes().count(), 0);
    }

    #[test]
    fn duplicate_group_is_rejected() {
        use crate::format::{GroupType, Paradigm};

        let mut ctx = DefinitionContext::new();
        ctx.accept(DefRecord::Otf2Group {
            group: GroupRef(0),
            group_type: GroupType::Other,
            paradigm: Paradigm::Other,
            members: vec![0],
        })
        .unwrap();
        let err = ctx.accept(DefRecord::Otf2Group {
            group: GroupRef(0),
            group_type: GroupType::Other,
            paradigm: Paradigm::Other,
            members: vec![0],
        });
        assert!(err.is_err());
    }

    #[test]
    fn communicator_referencing_undefined_group_is_a_hard_error() {
        let mut ctx = DefinitionContext::new();
        // an MPI COMM_LOCATIONS group must exist for the undefined-group
        // check in `finalize` to be reached at all.
        ctx.accept(DefRecord::Otf2Group {
            group: GroupRef(0),
            group_type: crate::format::GroupType::CommLocations,
            paradigm: crate::format::Paradigm::Mpi,
            members: vec![0],
        })
        .unwrap();
        ctx.accept(DefRecord::Otf2Comm {
            comm: ProcessGroup(100),
            group: GroupRef(99),
        })
        .unwrap();
        assert!(ctx.finalize().is_err());
    }
}

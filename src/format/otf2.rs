//! FFI glue for the unified-event-stream OTF2 format, linking the real
//! `libotf2` C library (`OTF2_Reader`, `OTF2_GlobalDefReaderCallbacks`,
//! `OTF2_GlobalEvtReaderCallbacks`). The decoder itself is out of scope;
//! this module only trampolines its callbacks into
//! [`DefinitionSink`]/[`EventSink`].

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;

use super::{
    Backend, DefRecord, DefinitionSink, EventRecord, EventSink, GroupType, LocationType, Paradigm,
};
use crate::error::{Error, FormatError};
use crate::ids::{GroupRef, Length, ProcessGroup, ProcessId, StringRef, Tag, Timestamp};

#[allow(non_camel_case_types)]
mod sys {
    use std::ffi::{c_char, c_void};

    pub const OTF2_SUCCESS: i32 = 0;
    pub const OTF2_CALLBACK_SUCCESS: i32 = 0;

    pub const OTF2_LOCATION_TYPE_CPU_THREAD: u32 = 0;
    pub const OTF2_LOCATION_TYPE_GPU: u32 = 1;
    pub const OTF2_LOCATION_TYPE_METRIC: u32 = 2;

    pub const OTF2_GROUP_TYPE_COMM_LOCATIONS: u32 = 0;

    pub const OTF2_PARADIGM_MPI: u32 = 5;

    #[repr(C)]
    pub struct OTF2_Reader {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF2_GlobalDefReader {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF2_GlobalDefReaderCallbacks {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF2_GlobalEvtReader {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF2_GlobalEvtReaderCallbacks {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF2_DefReader {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF2_AttributeList {
        _private: [u8; 0],
    }

    pub type LocationCb = unsafe extern "C" fn(
        *mut c_void,
        u64, // OTF2_LocationRef
        u32, // OTF2_StringRef
        u32, // OTF2_LocationType
        u64,
        u32, // OTF2_LocationGroupRef
    ) -> i32;
    pub type StringCb = unsafe extern "C" fn(*mut c_void, u32, *const c_char) -> i32;
    pub type GroupCb = unsafe extern "C" fn(
        *mut c_void,
        u32, // OTF2_GroupRef
        u32, // OTF2_StringRef
        u32, // OTF2_GroupType
        u32, // OTF2_Paradigm
        u32, // OTF2_GroupFlag
        u32,
        *const u64,
    ) -> i32;
    pub type CommCb = unsafe extern "C" fn(*mut c_void, u32, u32, u32, u32) -> i32;

    pub type MpiSendCb =
        unsafe extern "C" fn(u64, u64, *mut c_void, *mut OTF2_AttributeList, u32, u32, u32, u64) -> i32;
    pub type MpiIsendCb = unsafe extern "C" fn(
        u64,
        u64,
        *mut c_void,
        *mut OTF2_AttributeList,
        u32,
        u32,
        u32,
        u64,
        u64,
    ) -> i32;
    pub type MpiIsendCompleteCb =
        unsafe extern "C" fn(u64, u64, *mut c_void, *mut OTF2_AttributeList, u64) -> i32;
    pub type MpiRecvCb =
        unsafe extern "C" fn(u64, u64, *mut c_void, *mut OTF2_AttributeList, u32, u32, u32, u64) -> i32;
    pub type MpiIrecvCb = unsafe extern "C" fn(
        u64,
        u64,
        *mut c_void,
        *mut OTF2_AttributeList,
        u32,
        u32,
        u32,
        u64,
        u64,
    ) -> i32;
    pub type MpiIrecvRequestCb =
        unsafe extern "C" fn(u64, u64, *mut c_void, *mut OTF2_AttributeList, u64) -> i32;
    pub type MpiRequestCancelledCb =
        unsafe extern "C" fn(u64, u64, *mut c_void, *mut OTF2_AttributeList, u64) -> i32;
    pub type EnterLeaveCb =
        unsafe extern "C" fn(u64, u64, *mut c_void, *mut OTF2_AttributeList, u32) -> i32;

    extern "C" {
        pub fn OTF2_Reader_Open(anchor_file: *const c_char) -> *mut OTF2_Reader;
        pub fn OTF2_Reader_Close(reader: *mut OTF2_Reader) -> i32;

        pub fn OTF2_GlobalDefReaderCallbacks_New() -> *mut OTF2_GlobalDefReaderCallbacks;
        pub fn OTF2_GlobalDefReaderCallbacks_Delete(callbacks: *mut OTF2_GlobalDefReaderCallbacks);
        pub fn OTF2_GlobalDefReaderCallbacks_SetLocationCallback(
            callbacks: *mut OTF2_GlobalDefReaderCallbacks,
            cb: LocationCb,
        ) -> i32;
        pub fn OTF2_GlobalDefReaderCallbacks_SetStringCallback(
            callbacks: *mut OTF2_GlobalDefReaderCallbacks,
            cb: StringCb,
        ) -> i32;
        pub fn OTF2_GlobalDefReaderCallbacks_SetGroupCallback(
            callbacks: *mut OTF2_GlobalDefReaderCallbacks,
            cb: GroupCb,
        ) -> i32;
        pub fn OTF2_GlobalDefReaderCallbacks_SetCommCallback(
            callbacks: *mut OTF2_GlobalDefReaderCallbacks,
            cb: CommCb,
        ) -> i32;

        pub fn OTF2_Reader_GetGlobalDefReader(reader: *mut OTF2_Reader) -> *mut OTF2_GlobalDefReader;
        pub fn OTF2_Reader_RegisterGlobalDefCallbacks(
            reader: *mut OTF2_Reader,
            def_reader: *mut OTF2_GlobalDefReader,
            callbacks: *mut OTF2_GlobalDefReaderCallbacks,
            user_data: *mut c_void,
        ) -> i32;
        pub fn OTF2_Reader_ReadAllGlobalDefinitions(
            reader: *mut OTF2_Reader,
            def_reader: *mut OTF2_GlobalDefReader,
            definitions_read: *mut u64,
        ) -> i32;

        pub fn OTF2_Reader_SelectLocation(reader: *mut OTF2_Reader, location: u64) -> i32;
        pub fn OTF2_Reader_OpenDefFiles(reader: *mut OTF2_Reader) -> i32;
        pub fn OTF2_Reader_OpenEvtFiles(reader: *mut OTF2_Reader) -> i32;
        pub fn OTF2_Reader_CloseDefFiles(reader: *mut OTF2_Reader) -> i32;
        pub fn OTF2_Reader_GetDefReader(reader: *mut OTF2_Reader, location: u64) -> *mut OTF2_DefReader;
        pub fn OTF2_Reader_ReadAllLocalDefinitions(
            reader: *mut OTF2_Reader,
            def_reader: *mut OTF2_DefReader,
            definitions_read: *mut u64,
        ) -> i32;
        pub fn OTF2_Reader_CloseDefReader(reader: *mut OTF2_Reader, def_reader: *mut OTF2_DefReader) -> i32;
        pub fn OTF2_Reader_GetEvtReader(reader: *mut OTF2_Reader, location: u64) -> *mut c_void;

        pub fn OTF2_GlobalEvtReaderCallbacks_New() -> *mut OTF2_GlobalEvtReaderCallbacks;
        pub fn OTF2_GlobalEvtReaderCallbacks_Delete(callbacks: *mut OTF2_GlobalEvtReaderCallbacks);
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiSendCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiSendCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiIsendCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiIsendCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiIsendCompleteCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiIsendCompleteCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiRecvCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiRecvCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiIrecvCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiIrecvCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiIrecvRequestCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiIrecvRequestCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetMpiRequestCancelledCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: MpiRequestCancelledCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetEnterCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: EnterLeaveCb,
        ) -> i32;
        pub fn OTF2_GlobalEvtReaderCallbacks_SetLeaveCallback(
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            cb: EnterLeaveCb,
        ) -> i32;

        pub fn OTF2_Reader_GetGlobalEvtReader(reader: *mut OTF2_Reader) -> *mut OTF2_GlobalEvtReader;
        pub fn OTF2_Reader_RegisterGlobalEvtCallbacks(
            reader: *mut OTF2_Reader,
            evt_reader: *mut OTF2_GlobalEvtReader,
            callbacks: *mut OTF2_GlobalEvtReaderCallbacks,
            user_data: *mut c_void,
        ) -> i32;
        pub fn OTF2_Reader_ReadAllGlobalEvents(
            reader: *mut OTF2_Reader,
            evt_reader: *mut OTF2_GlobalEvtReader,
            events_read: *mut u64,
        ) -> i32;
        pub fn OTF2_Reader_CloseGlobalEvtReader(
            reader: *mut OTF2_Reader,
            evt_reader: *mut OTF2_GlobalEvtReader,
        ) -> i32;
    }
}

struct DefCallbackState<'a> {
    sink: &'a mut dyn DefinitionSink,
    error: Option<Error>,
}

struct EventCallbackState<'a> {
    sink: &'a mut dyn EventSink,
    error: Option<Error>,
}

fn location_type_of(raw: u32) -> LocationType {
    match raw {
        sys::OTF2_LOCATION_TYPE_METRIC => LocationType::Metric,
        sys::OTF2_LOCATION_TYPE_GPU => LocationType::Gpu,
        sys::OTF2_LOCATION_TYPE_CPU_THREAD => LocationType::Cpu,
        _ => LocationType::Other,
    }
}

unsafe extern "C" fn cb_location(
    user_data: *mut c_void,
    location: u64,
    name: u32,
    location_type: u32,
    _number_of_events: u64,
    location_group: u32,
) -> i32 {
    let state = &mut *(user_data as *mut DefCallbackState);
    let record = DefRecord::Otf2Location {
        location: ProcessId(location as i64),
        name: StringRef(name),
        location_type: location_type_of(location_type),
        location_group,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_string(user_data: *mut c_void, reference: u32, string: *const c_char) -> i32 {
    let state = &mut *(user_data as *mut DefCallbackState);
    let value = if string.is_null() {
        String::new()
    } else {
        CStr::from_ptr(string).to_string_lossy().into_owned()
    };
    let record = DefRecord::Otf2String {
        reference: StringRef(reference),
        value,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_group(
    user_data: *mut c_void,
    group: u32,
    _name: u32,
    group_type: u32,
    paradigm: u32,
    _group_flags: u32,
    number_of_members: u32,
    members: *const u64,
) -> i32 {
    let state = &mut *(user_data as *mut DefCallbackState);
    let members = if members.is_null() {
        Vec::new()
    } else {
        std::slice::from_raw_parts(members, number_of_members as usize).to_vec()
    };
    let record = DefRecord::Otf2Group {
        group: GroupRef(group),
        group_type: if group_type == sys::OTF2_GROUP_TYPE_COMM_LOCATIONS {
            GroupType::CommLocations
        } else {
            GroupType::Other
        },
        paradigm: if paradigm == sys::OTF2_PARADIGM_MPI {
            Paradigm::Mpi
        } else {
            Paradigm::Other
        },
        members,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_comm(
    user_data: *mut c_void,
    comm: u32,
    _name: u32,
    group: u32,
    _parent: u32,
) -> i32 {
    let state = &mut *(user_data as *mut DefCallbackState);
    let record = DefRecord::Otf2Comm {
        comm: ProcessGroup(comm as i64),
        group: GroupRef(group),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_send(
    sender: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    receiver: u32,
    com: u32,
    tag: u32,
    length: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiSend {
        sender: ProcessId(sender as i64),
        time: Timestamp(time as i64),
        receiver_local_rank: crate::ids::LocalRank(receiver),
        comm: ProcessGroup(com as i64),
        tag: Tag(tag as i32),
        length: Length(length as i64),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_isend(
    sender: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    receiver: u32,
    com: u32,
    tag: u32,
    length: u64,
    request_id: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiIsend {
        sender: ProcessId(sender as i64),
        time: Timestamp(time as i64),
        receiver_local_rank: crate::ids::LocalRank(receiver),
        comm: ProcessGroup(com as i64),
        tag: Tag(tag as i32),
        length: Length(length as i64),
        request_id,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_isend_complete(
    sender: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    request_id: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiIsendComplete {
        sender: ProcessId(sender as i64),
        time: Timestamp(time as i64),
        request_id,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_recv(
    receiver: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    sender: u32,
    com: u32,
    tag: u32,
    length: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiRecv {
        receiver: ProcessId(receiver as i64),
        time: Timestamp(time as i64),
        sender_local_rank: crate::ids::LocalRank(sender),
        comm: ProcessGroup(com as i64),
        tag: Tag(tag as i32),
        length: Length(length as i64),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_irecv(
    receiver: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    sender: u32,
    com: u32,
    tag: u32,
    length: u64,
    request_id: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiIrecv {
        receiver: ProcessId(receiver as i64),
        time: Timestamp(time as i64),
        sender_local_rank: crate::ids::LocalRank(sender),
        comm: ProcessGroup(com as i64),
        tag: Tag(tag as i32),
        length: Length(length as i64),
        request_id,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_irecv_request(
    location: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    request_id: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiIrecvRequest {
        receiver: ProcessId(location as i64),
        time: Timestamp(time as i64),
        request_id,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_mpi_request_cancelled(
    location: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    request_id: u64,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::MpiRequestCancelled {
        location: ProcessId(location as i64),
        time: Timestamp(time as i64),
        request_id,
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_enter(
    location: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    _region: u32,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::Otf2Enter {
        location: ProcessId(location as i64),
        time: Timestamp(time as i64),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

unsafe extern "C" fn cb_leave(
    location: u64,
    time: u64,
    user_data: *mut c_void,
    _attrs: *mut sys::OTF2_AttributeList,
    _region: u32,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::Otf2Leave {
        location: ProcessId(location as i64),
        time: Timestamp(time as i64),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 1;
    }
    sys::OTF2_CALLBACK_SUCCESS
}

/// Owns one `OTF2_Reader` handle for the lifetime of an open trace.
///
/// `OTF2_Reader_SelectLocation` has no "deselect" counterpart: selections
/// accumulate on the same reader. Since each `select_process` call must
/// start from a clean slate (§4.5), the reader itself is closed and
/// reopened from `anchor` on every call instead.
pub struct Otf2Backend {
    reader: *mut sys::OTF2_Reader,
    anchor: CString,
    selected: Option<u64>,
}

impl Otf2Backend {
    /// Attempts to open `path` as an OTF2 anchor file. Returns `Ok(None)`
    /// when `OTF2_Reader_Open` fails, so [`super::open`] can report
    /// `InvalidTrace` once both formats have been tried.
    pub fn try_open(path: &Path) -> Result<Option<Self>, FormatError> {
        let anchor = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
            FormatError::DecodeFailed {
                what: "path",
                reason: "trace path contains an interior NUL".to_string(),
            }
        })?;
        unsafe {
            let reader = sys::OTF2_Reader_Open(anchor.as_ptr());
            if reader.is_null() {
                return Ok(None);
            }
            Ok(Some(Otf2Backend {
                reader,
                anchor,
                selected: None,
            }))
        }
    }
}

impl Drop for Otf2Backend {
    fn drop(&mut self) {
        unsafe {
            if !self.reader.is_null() {
                sys::OTF2_Reader_Close(self.reader);
            }
        }
    }
}

impl Backend for Otf2Backend {
    fn read_definitions(&mut self, sink: &mut dyn DefinitionSink) -> Result<(), Error> {
        unsafe {
            let callbacks = sys::OTF2_GlobalDefReaderCallbacks_New();
            sys::OTF2_GlobalDefReaderCallbacks_SetLocationCallback(callbacks, cb_location);
            sys::OTF2_GlobalDefReaderCallbacks_SetStringCallback(callbacks, cb_string);
            sys::OTF2_GlobalDefReaderCallbacks_SetGroupCallback(callbacks, cb_group);
            sys::OTF2_GlobalDefReaderCallbacks_SetCommCallback(callbacks, cb_comm);

            let def_reader = sys::OTF2_Reader_GetGlobalDefReader(self.reader);
            let mut state = DefCallbackState { sink, error: None };
            sys::OTF2_Reader_RegisterGlobalDefCallbacks(
                self.reader,
                def_reader,
                callbacks,
                &mut state as *mut _ as *mut c_void,
            );

            let mut read = 0u64;
            sys::OTF2_Reader_ReadAllGlobalDefinitions(self.reader, def_reader, &mut read);
            sys::OTF2_GlobalDefReaderCallbacks_Delete(callbacks);

            if let Some(e) = state.error {
                return Err(e);
            }
        }
        Ok(())
    }

    fn select_process(&mut self, process: ProcessId) -> Result<(), Error> {
        let location = process.0 as u64;
        unsafe {
            // OTF2_Reader_SelectLocation only ever adds to the reader's
            // selection; reopen a fresh reader so this selection starts
            // clean instead of replaying every previously loaded process.
            sys::OTF2_Reader_Close(self.reader);
            let reader = sys::OTF2_Reader_Open(self.anchor.as_ptr());
            if reader.is_null() {
                self.reader = std::ptr::null_mut();
                return Err(FormatError::DecodeFailed {
                    what: "events",
                    reason: "OTF2_Reader_Open returned null while reselecting a location"
                        .to_string(),
                }
                .into());
            }
            self.reader = reader;

            sys::OTF2_Reader_SelectLocation(self.reader, location);
            let opened_defs = sys::OTF2_Reader_OpenDefFiles(self.reader) == sys::OTF2_SUCCESS;
            sys::OTF2_Reader_OpenEvtFiles(self.reader);

            if opened_defs {
                let def_reader = sys::OTF2_Reader_GetDefReader(self.reader, location);
                if !def_reader.is_null() {
                    let mut read = 0u64;
                    sys::OTF2_Reader_ReadAllLocalDefinitions(self.reader, def_reader, &mut read);
                    sys::OTF2_Reader_CloseDefReader(self.reader, def_reader);
                }
            }
            sys::OTF2_Reader_GetEvtReader(self.reader, location);
            if opened_defs {
                sys::OTF2_Reader_CloseDefFiles(self.reader);
            }
        }
        self.selected = Some(location);
        Ok(())
    }

    fn read_events(&mut self, sink: &mut dyn EventSink) -> Result<(), Error> {
        if self.selected.is_none() {
            return Err(FormatError::DecodeFailed {
                what: "events",
                reason: "no process selected".to_string(),
            }
            .into());
        }
        unsafe {
            let callbacks = sys::OTF2_GlobalEvtReaderCallbacks_New();
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiSendCallback(callbacks, cb_mpi_send);
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiIsendCallback(callbacks, cb_mpi_isend);
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiIsendCompleteCallback(
                callbacks,
                cb_mpi_isend_complete,
            );
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiRecvCallback(callbacks, cb_mpi_recv);
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiIrecvCallback(callbacks, cb_mpi_irecv);
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiIrecvRequestCallback(
                callbacks,
                cb_mpi_irecv_request,
            );
            sys::OTF2_GlobalEvtReaderCallbacks_SetMpiRequestCancelledCallback(
                callbacks,
                cb_mpi_request_cancelled,
            );
            sys::OTF2_GlobalEvtReaderCallbacks_SetEnterCallback(callbacks, cb_enter);
            sys::OTF2_GlobalEvtReaderCallbacks_SetLeaveCallback(callbacks, cb_leave);

            let evt_reader = sys::OTF2_Reader_GetGlobalEvtReader(self.reader);
            let mut state = EventCallbackState { sink, error: None };
            sys::OTF2_Reader_RegisterGlobalEvtCallbacks(
                self.reader,
                evt_reader,
                callbacks,
                &mut state as *mut _ as *mut c_void,
            );

            let mut read = 0u64;
            sys::OTF2_Reader_ReadAllGlobalEvents(self.reader, evt_reader, &mut read);
            sys::OTF2_Reader_CloseGlobalEvtReader(self.reader, evt_reader);
            sys::OTF2_GlobalEvtReaderCallbacks_Delete(callbacks);

            if let Some(e) = state.error {
                return Err(e);
            }
        }
        Ok(())
    }
}

//! FFI glue for the legacy OTF1 stream-per-process format, linking the
//! real `libotf` C library (`OTF_Reader`, `OTF_FileManager`,
//! `OTF_HandlerArray`). The decoder itself is out of scope; this module
//! only trampolines its callbacks into [`DefinitionSink`]/[`EventSink`].

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;

use super::{Backend, DefRecord, DefinitionSink, EventRecord, EventSink};
use crate::error::{Error, FormatError};
use crate::ids::{Length, ProcessGroup, ProcessId, Tag, Timestamp};

#[allow(non_camel_case_types)]
mod sys {
    use std::ffi::{c_char, c_void};

    pub const OTF_DEFPROCESS_RECORD: u32 = 1;
    pub const OTF_SEND_RECORD: u32 = 2;
    pub const OTF_RECEIVE_RECORD: u32 = 3;
    pub const OTF_ENTER_RECORD: u32 = 4;
    pub const OTF_LEAVE_RECORD: u32 = 5;

    #[repr(C)]
    pub struct OTF_FileManager {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF_HandlerArray {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF_Reader {
        _private: [u8; 0],
    }
    #[repr(C)]
    pub struct OTF_KeyValueList {
        _private: [u8; 0],
    }

    pub type OTF_FunctionPointer = unsafe extern "C" fn();

    extern "C" {
        pub fn OTF_FileManager_open(max_files: u32) -> *mut OTF_FileManager;
        pub fn OTF_FileManager_close(manager: *mut OTF_FileManager);
        pub fn OTF_HandlerArray_open() -> *mut OTF_HandlerArray;
        pub fn OTF_HandlerArray_close(array: *mut OTF_HandlerArray);
        pub fn OTF_HandlerArray_setHandler(
            array: *mut OTF_HandlerArray,
            pointer: OTF_FunctionPointer,
            record: u32,
        ) -> i32;
        pub fn OTF_HandlerArray_setFirstHandlerArg(
            array: *mut OTF_HandlerArray,
            arg: *mut c_void,
            record: u32,
        ) -> i32;
        pub fn OTF_Reader_open(namestub: *const c_char, manager: *mut OTF_FileManager)
            -> *mut OTF_Reader;
        pub fn OTF_Reader_close(reader: *mut OTF_Reader);
        pub fn OTF_Reader_readDefinitions(reader: *mut OTF_Reader, array: *mut OTF_HandlerArray) -> u64;
        pub fn OTF_Reader_readEvents(reader: *mut OTF_Reader, array: *mut OTF_HandlerArray) -> u64;
        pub fn OTF_Reader_setProcessStatus(reader: *mut OTF_Reader, process: u32, status: u8);
        pub fn OTF_Reader_setProcessStatusAll(reader: *mut OTF_Reader, status: u8);
    }

    pub const OTF_ENABLE: u8 = 1;
}

struct DefCallbackState<'a> {
    sink: &'a mut dyn DefinitionSink,
    error: Option<Error>,
}

struct EventCallbackState<'a> {
    sink: &'a mut dyn EventSink,
    error: Option<Error>,
}

unsafe extern "C" fn handle_def_process(
    user_data: *mut c_void,
    id: u32,
    name: *const c_char,
    parent: u32,
) -> i32 {
    let state = &mut *(user_data as *mut DefCallbackState);
    let name = if name.is_null() {
        String::new()
    } else {
        CStr::from_ptr(name).to_string_lossy().into_owned()
    };
    let record = DefRecord::Otf1Process {
        id: ProcessId(id as i64),
        name,
        parent: if parent == 0 {
            None
        } else {
            Some(ProcessId(parent as i64))
        },
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 0;
    }
    1
}

unsafe extern "C" fn handle_send(
    user_data: *mut c_void,
    time: u64,
    sender: u32,
    receiver: u32,
    group: u32,
    tag: u32,
    length: u32,
    _source: u32,
    _list: *mut sys::OTF_KeyValueList,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::Otf1Send {
        time: Timestamp(time as i64),
        sender: ProcessId(sender as i64),
        receiver: ProcessId(receiver as i64),
        group: ProcessGroup(group as i64),
        tag: Tag(tag as i32),
        length: Length(length as i64),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 0;
    }
    1
}

unsafe extern "C" fn handle_receive(
    user_data: *mut c_void,
    time: u64,
    receiver: u32,
    sender: u32,
    group: u32,
    tag: u32,
    length: u32,
    _source: u32,
    _list: *mut sys::OTF_KeyValueList,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    let record = EventRecord::Otf1Receive {
        time: Timestamp(time as i64),
        receiver: ProcessId(receiver as i64),
        sender: ProcessId(sender as i64),
        group: ProcessGroup(group as i64),
        tag: Tag(tag as i32),
        length: Length(length as i64),
    };
    if let Err(e) = state.sink.accept(record) {
        state.error = Some(e);
        return 0;
    }
    1
}

unsafe extern "C" fn handle_enter(
    user_data: *mut c_void,
    time: u64,
    _id: u32,
    process: u32,
    _source: u32,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    if let Err(e) = state.sink.accept(EventRecord::Otf1Enter {
        time: Timestamp(time as i64),
        process: ProcessId(process as i64),
    }) {
        state.error = Some(e);
        return 0;
    }
    1
}

unsafe extern "C" fn handle_leave(
    user_data: *mut c_void,
    time: u64,
    _id: u32,
    process: u32,
    _source: u32,
) -> i32 {
    let state = &mut *(user_data as *mut EventCallbackState);
    if let Err(e) = state.sink.accept(EventRecord::Otf1Leave {
        time: Timestamp(time as i64),
        process: ProcessId(process as i64),
    }) {
        state.error = Some(e);
        return 0;
    }
    1
}

/// Owns the three `libotf` handles for the lifetime of one open trace.
/// Released in matching pairs on `Drop`, mirroring the original's
/// `Otf_init`/`Otf_open`/`Otf_finalize` scoping.
pub struct Otf1Backend {
    manager: *mut sys::OTF_FileManager,
    reader: *mut sys::OTF_Reader,
    selected: Option<u32>,
}

impl Otf1Backend {
    /// Attempts to open `path` as an OTF1 master-trace stub. Format
    /// detection is purely by attempted decode: returns `Ok(None)` (not
    /// an error) only when `OTF_Reader_open` itself fails, so
    /// [`super::open`] can fall through to OTF2; there is no filename
    /// heuristic.
    pub fn try_open(path: &Path) -> Result<Option<Self>, FormatError> {
        let namestub = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
            FormatError::DecodeFailed {
                what: "path",
                reason: "trace path contains an interior NUL".to_string(),
            }
        })?;

        unsafe {
            let manager = sys::OTF_FileManager_open(100);
            if manager.is_null() {
                return Err(FormatError::DecodeFailed {
                    what: "file manager",
                    reason: "OTF_FileManager_open returned null".to_string(),
                });
            }
            let reader = sys::OTF_Reader_open(namestub.as_ptr(), manager);
            if reader.is_null() {
                sys::OTF_FileManager_close(manager);
                return Ok(None);
            }
            Ok(Some(Otf1Backend {
                manager,
                reader,
                selected: None,
            }))
        }
    }
}

impl Drop for Otf1Backend {
    fn drop(&mut self) {
        unsafe {
            sys::OTF_Reader_close(self.reader);
            sys::OTF_FileManager_close(self.manager);
        }
    }
}

impl Backend for Otf1Backend {
    fn read_definitions(&mut self, sink: &mut dyn DefinitionSink) -> Result<(), Error> {
        unsafe {
            let array = sys::OTF_HandlerArray_open();
            let mut state = DefCallbackState { sink, error: None };

            sys::OTF_HandlerArray_setHandler(
                array,
                std::mem::transmute(handle_def_process as unsafe extern "C" fn(_, _, _, _) -> i32),
                sys::OTF_DEFPROCESS_RECORD,
            );
            sys::OTF_HandlerArray_setFirstHandlerArg(
                array,
                &mut state as *mut _ as *mut c_void,
                sys::OTF_DEFPROCESS_RECORD,
            );

            sys::OTF_Reader_readDefinitions(self.reader, array);
            sys::OTF_HandlerArray_close(array);

            if let Some(e) = state.error {
                return Err(e);
            }
        }
        Ok(())
    }

    fn select_process(&mut self, process: ProcessId) -> Result<(), Error> {
        let id = process.0 as u32;
        unsafe {
            // clear out whatever was enabled by a prior selection before
            // enabling this one; OTF_Reader_setProcessStatus is additive.
            sys::OTF_Reader_setProcessStatusAll(self.reader, 0);
            sys::OTF_Reader_setProcessStatus(self.reader, id, sys::OTF_ENABLE);
        }
        self.selected = Some(id);
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
            let array = sys::OTF_HandlerArray_open();
            let mut state = EventCallbackState { sink, error: None };
            let arg = &mut state as *mut _ as *mut c_void;

            sys::OTF_HandlerArray_setHandler(
                array,
                std::mem::transmute(
                    handle_send as unsafe extern "C" fn(_, _, _, _, _, _, _, _, _) -> i32,
                ),
                sys::OTF_SEND_RECORD,
            );
            sys::OTF_HandlerArray_setFirstHandlerArg(array, arg, sys::OTF_SEND_RECORD);

            sys::OTF_HandlerArray_setHandler(
                array,
                std::mem::transmute(
                    handle_receive as unsafe extern "C" fn(_, _, _, _, _, _, _, _, _) -> i32,
                ),
                sys::OTF_RECEIVE_RECORD,
            );
            sys::OTF_HandlerArray_setFirstHandlerArg(array, arg, sys::OTF_RECEIVE_RECORD);

            sys::OTF_HandlerArray_setHandler(
                array,
                std::mem::transmute(handle_enter as unsafe extern "C" fn(_, _, _, _, _) -> i32),
                sys::OTF_ENTER_RECORD,
            );
            sys::OTF_HandlerArray_setFirstHandlerArg(array, arg, sys::OTF_ENTER_RECORD);

            sys::OTF_HandlerArray_setHandler(
                array,
                std::mem::transmute(handle_leave as unsafe extern "C" fn(_, _, _, _, _) -> i32),
                sys::OTF_LEAVE_RECORD,
            );
            sys::OTF_HandlerArray_setFirstHandlerArg(array, arg, sys::OTF_LEAVE_RECORD);

            sys::OTF_Reader_readEvents(self.reader, array);
            sys::OTF_HandlerArray_close(array);

            if let Some(e) = state.error {
                return Err(e);
            }
        }
        Ok(())
    }
}

//! Raw bindings for the libmpv client and render APIs.
//!
//! Loaded at runtime via `libloading` from the installer's output, so a
//! missing library is an ordinary error rather than a link failure. Only the
//! functions the secondary backend calls are bound.
//!
//! Reference: mpv `client.h` and `render.h` / `render_gl.h`.

use std::ffi::{c_char, c_int, c_void};
use std::path::Path;

use libloading::Library;
use tracing::{debug, info};

use crate::error::CoreError;

// ─── Opaque handles ─────────────────────────────────────────────────

#[repr(C)]
pub struct MpvHandle {
    _private: [u8; 0],
}

#[repr(C)]
pub struct MpvRenderContext {
    _private: [u8; 0],
}

// ─── Formats ────────────────────────────────────────────────────────

pub type MpvFormat = c_int;

pub const MPV_FORMAT_NONE: MpvFormat = 0;
pub const MPV_FORMAT_STRING: MpvFormat = 1;
pub const MPV_FORMAT_FLAG: MpvFormat = 3;
pub const MPV_FORMAT_INT64: MpvFormat = 4;
pub const MPV_FORMAT_DOUBLE: MpvFormat = 5;

// ─── Events ─────────────────────────────────────────────────────────

pub type MpvEventId = c_int;

pub const MPV_EVENT_NONE: MpvEventId = 0;
pub const MPV_EVENT_SHUTDOWN: MpvEventId = 1;
pub const MPV_EVENT_END_FILE: MpvEventId = 7;
pub const MPV_EVENT_FILE_LOADED: MpvEventId = 8;
pub const MPV_EVENT_PLAYBACK_RESTART: MpvEventId = 21;
pub const MPV_EVENT_PROPERTY_CHANGE: MpvEventId = 22;

pub const MPV_END_FILE_REASON_EOF: c_int = 0;
pub const MPV_END_FILE_REASON_STOP: c_int = 2;
pub const MPV_END_FILE_REASON_QUIT: c_int = 3;
pub const MPV_END_FILE_REASON_ERROR: c_int = 4;

#[repr(C)]
pub struct MpvEvent {
    pub event_id: MpvEventId,
    pub error: c_int,
    pub reply_userdata: u64,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct MpvEventProperty {
    pub name: *const c_char,
    pub format: MpvFormat,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct MpvEventEndFile {
    pub reason: c_int,
    pub error: c_int,
    pub playlist_entry_id: i64,
    pub playlist_insert_id: i64,
    pub playlist_insert_num_entries: c_int,
}

// ─── Render API ─────────────────────────────────────────────────────

pub type MpvRenderParamType = c_int;

pub const MPV_RENDER_PARAM_INVALID: MpvRenderParamType = 0;
pub const MPV_RENDER_PARAM_API_TYPE: MpvRenderParamType = 1;
pub const MPV_RENDER_PARAM_OPENGL_INIT_PARAMS: MpvRenderParamType = 2;
pub const MPV_RENDER_PARAM_OPENGL_FBO: MpvRenderParamType = 3;
pub const MPV_RENDER_PARAM_FLIP_Y: MpvRenderParamType = 4;

pub const MPV_RENDER_API_TYPE_OPENGL: &[u8] = b"opengl\0";

pub const MPV_RENDER_UPDATE_FRAME: u64 = 1;

#[repr(C)]
pub struct MpvRenderParam {
    pub param_type: MpvRenderParamType,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct MpvOpenGlInitParams {
    pub get_proc_address: Option<unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void>,
    pub get_proc_address_ctx: *mut c_void,
}

#[repr(C)]
pub struct MpvOpenGlFbo {
    pub fbo: c_int,
    pub w: c_int,
    pub h: c_int,
    pub internal_format: c_int,
}

pub type MpvRenderUpdateFn = unsafe extern "C" fn(cb_ctx: *mut c_void);

/// Oldest client API we accept (mpv 0.35, API 2.0).
pub const MIN_CLIENT_API_VERSION: u64 = 2 << 16;

// ─── Function table ─────────────────────────────────────────────────

pub struct MpvFunctions {
    pub client_api_version: unsafe extern "C" fn() -> u64,
    pub error_string: unsafe extern "C" fn(c_int) -> *const c_char,
    pub free: unsafe extern "C" fn(*mut c_void),
    pub create: unsafe extern "C" fn() -> *mut MpvHandle,
    pub initialize: unsafe extern "C" fn(*mut MpvHandle) -> c_int,
    pub terminate_destroy: unsafe extern "C" fn(*mut MpvHandle),
    pub set_option_string:
        unsafe extern "C" fn(*mut MpvHandle, *const c_char, *const c_char) -> c_int,
    pub command: unsafe extern "C" fn(*mut MpvHandle, *mut *const c_char) -> c_int,
    pub set_property_string:
        unsafe extern "C" fn(*mut MpvHandle, *const c_char, *const c_char) -> c_int,
    pub get_property:
        unsafe extern "C" fn(*mut MpvHandle, *const c_char, MpvFormat, *mut c_void) -> c_int,
    pub observe_property:
        unsafe extern "C" fn(*mut MpvHandle, u64, *const c_char, MpvFormat) -> c_int,
    pub wait_event: unsafe extern "C" fn(*mut MpvHandle, f64) -> *mut MpvEvent,
    pub wakeup: unsafe extern "C" fn(*mut MpvHandle),
    pub render_context_create: unsafe extern "C" fn(
        *mut *mut MpvRenderContext,
        *mut MpvHandle,
        *mut MpvRenderParam,
    ) -> c_int,
    pub render_context_set_update_callback:
        unsafe extern "C" fn(*mut MpvRenderContext, Option<MpvRenderUpdateFn>, *mut c_void),
    pub render_context_update: unsafe extern "C" fn(*mut MpvRenderContext) -> u64,
    pub render_context_render: unsafe extern "C" fn(*mut MpvRenderContext, *mut MpvRenderParam) -> c_int,
    pub render_context_report_swap: unsafe extern "C" fn(*mut MpvRenderContext),
    pub render_context_free: unsafe extern "C" fn(*mut MpvRenderContext),
}

/// Dynamically loaded libmpv with its function table.
pub struct MpvLibrary {
    /// Must outlive every use of `api`.
    _lib: Library,
    pub api: MpvFunctions,
}

// SAFETY: the table holds plain C function pointers into a library that stays
// loaded for the lifetime of this value. libmpv's client API is thread-safe.
unsafe impl Send for MpvLibrary {}
unsafe impl Sync for MpvLibrary {}

impl std::fmt::Debug for MpvLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpvLibrary").field("loaded", &true).finish()
    }
}

macro_rules! load_symbol {
    ($lib:expr, $name:literal) => {
        *$lib
            .get(concat!($name, "\0").as_bytes())
            .map_err(|e| CoreError::SymbolNotFound(format!("{}: {e}", $name)))?
    };
}

impl MpvLibrary {
    /// Load libmpv from an absolute path. Nothing in the process environment
    /// is changed; dependencies resolve through the relinked load paths.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        info!(path = %path.display(), "Loading libmpv");

        // SAFETY: loading a library the installer verified. Its initializers
        // only register libmpv internals.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| CoreError::LibraryNotFound(format!("{}: {e}", path.display())))?;

        // SAFETY: every symbol below is a documented libmpv export and the
        // signatures match client.h / render.h.
        let api = unsafe {
            MpvFunctions {
                client_api_version: load_symbol!(lib, "mpv_client_api_version"),
                error_string: load_symbol!(lib, "mpv_error_string"),
                free: load_symbol!(lib, "mpv_free"),
                create: load_symbol!(lib, "mpv_create"),
                initialize: load_symbol!(lib, "mpv_initialize"),
                terminate_destroy: load_symbol!(lib, "mpv_terminate_destroy"),
                set_option_string: load_symbol!(lib, "mpv_set_option_string"),
                command: load_symbol!(lib, "mpv_command"),
                set_property_string: load_symbol!(lib, "mpv_set_property_string"),
                get_property: load_symbol!(lib, "mpv_get_property"),
                observe_property: load_symbol!(lib, "mpv_observe_property"),
                wait_event: load_symbol!(lib, "mpv_wait_event"),
                wakeup: load_symbol!(lib, "mpv_wakeup"),
                render_context_create: load_symbol!(lib, "mpv_render_context_create"),
                render_context_set_update_callback: load_symbol!(
                    lib,
                    "mpv_render_context_set_update_callback"
                ),
                render_context_update: load_symbol!(lib, "mpv_render_context_update"),
                render_context_render: load_symbol!(lib, "mpv_render_context_render"),
                render_context_report_swap: load_symbol!(lib, "mpv_render_context_report_swap"),
                render_context_free: load_symbol!(lib, "mpv_render_context_free"),
            }
        };

        // SAFETY: takes no arguments, returns a constant.
        let version = unsafe { (api.client_api_version)() };
        if version < MIN_CLIENT_API_VERSION {
            return Err(CoreError::ApiVersion {
                required: MIN_CLIENT_API_VERSION,
                found: version,
            });
        }
        debug!(
            api_version = %format!("{}.{}", version >> 16, version & 0xffff),
            "All libmpv symbols loaded"
        );

        Ok(Self { _lib: lib, api })
    }

    /// Human-readable text for an mpv status code.
    pub fn error_message(&self, code: c_int) -> String {
        // SAFETY: mpv_error_string returns a static string for any code.
        let ptr = unsafe { (self.api.error_string)(code) };
        if ptr.is_null() {
            return format!("error {code}");
        }
        // SAFETY: non-null, NUL-terminated, static lifetime.
        unsafe { std::ffi::CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned()
    }

    pub fn check(&self, call: &'static str, code: c_int) -> Result<(), CoreError> {
        if code >= 0 {
            Ok(())
        } else {
            Err(CoreError::Api {
                call,
                code,
                message: self.error_message(code),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported() {
        let path = std::env::temp_dir().join("vl_no_such_libmpv.so");
        let err = MpvLibrary::load_from(&path).unwrap_err();
        assert!(err.is_missing_library());
    }

    #[test]
    fn min_api_version_is_two_zero() {
        assert_eq!(MIN_CLIENT_API_VERSION >> 16, 2);
    }
}

//! Safe libmpv client wrapper and the [`PlayerCore`] seam.
//!
//! The secondary backend only talks to `PlayerCore`, so tests drive it with a
//! scripted fake. [`MpvClient`] is the real implementation.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::ffi::{
    MpvEvent, MpvEventEndFile, MpvEventProperty, MpvFormat, MpvHandle, MpvLibrary,
    MPV_END_FILE_REASON_EOF, MPV_END_FILE_REASON_ERROR, MPV_END_FILE_REASON_QUIT,
    MPV_END_FILE_REASON_STOP, MPV_EVENT_END_FILE, MPV_EVENT_FILE_LOADED, MPV_EVENT_NONE,
    MPV_EVENT_PLAYBACK_RESTART, MPV_EVENT_PROPERTY_CHANGE, MPV_EVENT_SHUTDOWN, MPV_FORMAT_DOUBLE,
    MPV_FORMAT_FLAG, MPV_FORMAT_INT64, MPV_FORMAT_NONE, MPV_FORMAT_STRING,
};
use super::render::MpvRenderer;
use crate::error::CoreError;
use crate::surface::{GlLoader, GlTarget};

/// Options applied before `mpv_initialize`.
pub const DEFAULT_OPTIONS: &[(&str, &str)] = &[
    ("vo", "libmpv"),
    ("hwdec", "auto-safe"),
    ("keep-open", "yes"),
    ("pause", "yes"),
    ("idle", "yes"),
    ("input-default-bindings", "no"),
    ("osc", "no"),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropertyFormat {
    Flag,
    Int,
    Double,
    Str,
}

impl PropertyFormat {
    fn raw(self) -> MpvFormat {
        match self {
            Self::Flag => MPV_FORMAT_FLAG,
            Self::Int => MPV_FORMAT_INT64,
            Self::Double => MPV_FORMAT_DOUBLE,
            Self::Str => MPV_FORMAT_STRING,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Property currently unavailable.
    None,
    Flag(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    Eof,
    Stop,
    Quit,
    Error,
    Other(i32),
}

impl EndReason {
    fn from_raw(raw: c_int) -> Self {
        match raw {
            MPV_END_FILE_REASON_EOF => Self::Eof,
            MPV_END_FILE_REASON_STOP => Self::Stop,
            MPV_END_FILE_REASON_QUIT => Self::Quit,
            MPV_END_FILE_REASON_ERROR => Self::Error,
            other => Self::Other(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CoreEvent {
    /// Timed out with nothing to report.
    None,
    Shutdown,
    FileLoaded,
    PlaybackRestart,
    EndFile {
        reason: EndReason,
        error: Option<String>,
    },
    PropertyChanged {
        name: String,
        value: PropertyValue,
    },
    Other(i32),
}

pub type UpdateCallback = Box<dyn Fn() + Send + Sync>;

/// Player core the secondary backend drives.
///
/// All methods may be called from any thread, except `wait_event`, which
/// only the backend's event thread calls.
pub trait PlayerCore: Send + Sync {
    fn command(&self, args: &[&str]) -> Result<(), CoreError>;

    fn set_property(&self, name: &str, value: &str) -> Result<(), CoreError>;

    fn get_f64(&self, name: &str) -> Result<f64, CoreError>;

    fn get_i64(&self, name: &str) -> Result<i64, CoreError>;

    fn observe(&self, id: u64, name: &str, format: PropertyFormat) -> Result<(), CoreError>;

    fn wait_event(&self, timeout_secs: f64) -> CoreEvent;

    /// Interrupt a blocked `wait_event`.
    fn wakeup(&self);

    /// Create the GPU renderer. `on_update` fires on mpv's threads.
    fn attach_renderer(&self, loader: GlLoader, on_update: UpdateCallback) -> Result<(), CoreError>;

    /// Draw the next frame if there is one. Returns whether it drew.
    fn render(&self, target: GlTarget) -> Result<bool, CoreError>;
}

fn c_string(s: &str) -> Result<CString, CoreError> {
    CString::new(s).map_err(|_| CoreError::InvalidString(s.to_string()))
}

/// A live, initialized mpv handle.
pub struct MpvClient {
    lib: Arc<MpvLibrary>,
    handle: *mut MpvHandle,
    renderer: Mutex<Option<MpvRenderer>>,
}

// SAFETY: the libmpv client API is thread-safe for every call made here;
// `wait_event` is restricted to one thread by the `PlayerCore` contract.
unsafe impl Send for MpvClient {}
unsafe impl Sync for MpvClient {}

impl MpvClient {
    /// Load the library at `path` and create a client with [`DEFAULT_OPTIONS`].
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let lib = Arc::new(MpvLibrary::load_from(path)?);
        Self::create(lib, DEFAULT_OPTIONS)
    }

    pub fn create(lib: Arc<MpvLibrary>, options: &[(&str, &str)]) -> Result<Self, CoreError> {
        // SAFETY: mpv_create has no preconditions.
        let handle = unsafe { (lib.api.create)() };
        if handle.is_null() {
            return Err(CoreError::CreateFailed);
        }
        let client = Self {
            lib,
            handle,
            renderer: Mutex::new(None),
        };

        for (name, value) in options {
            let (n, v) = (c_string(name)?, c_string(value)?);
            // SAFETY: handle is live, strings are NUL-terminated.
            let code = unsafe { (client.lib.api.set_option_string)(client.handle, n.as_ptr(), v.as_ptr()) };
            if let Err(e) = client.lib.check("mpv_set_option_string", code) {
                // Optional features (osc) are missing from some builds.
                warn!(option = %name, value = %value, error = %e, "libmpv rejected option");
            }
        }

        // SAFETY: handle is live and not yet initialized.
        let code = unsafe { (client.lib.api.initialize)(client.handle) };
        client.lib.check("mpv_initialize", code)?;
        debug!("libmpv client initialized");
        Ok(client)
    }

    fn get_raw<T: Default>(&self, name: &str, format: MpvFormat) -> Result<T, CoreError> {
        let n = c_string(name)?;
        let mut value = T::default();
        // SAFETY: `value` matches `format` (f64 for DOUBLE, i64 for INT64).
        let code = unsafe {
            (self.lib.api.get_property)(
                self.handle,
                n.as_ptr(),
                format,
                &mut value as *mut T as *mut c_void,
            )
        };
        self.lib.check("mpv_get_property", code)?;
        Ok(value)
    }

    /// Decode a property payload.
    ///
    /// # Safety
    /// `data` must point at a value of `format` as laid out by libmpv.
    unsafe fn property_value(format: MpvFormat, data: *mut c_void) -> PropertyValue {
        if data.is_null() {
            return PropertyValue::None;
        }
        match format {
            MPV_FORMAT_FLAG => PropertyValue::Flag(*(data as *const c_int) != 0),
            MPV_FORMAT_INT64 => PropertyValue::Int(*(data as *const i64)),
            MPV_FORMAT_DOUBLE => PropertyValue::Double(*(data as *const f64)),
            MPV_FORMAT_STRING => {
                let s = *(data as *const *const c_char);
                if s.is_null() {
                    PropertyValue::None
                } else {
                    PropertyValue::Str(CStr::from_ptr(s).to_string_lossy().into_owned())
                }
            }
            MPV_FORMAT_NONE => PropertyValue::None,
            _ => PropertyValue::None,
        }
    }

    fn translate(&self, event: &MpvEvent) -> CoreEvent {
        match event.event_id {
            MPV_EVENT_NONE => CoreEvent::None,
            MPV_EVENT_SHUTDOWN => CoreEvent::Shutdown,
            MPV_EVENT_FILE_LOADED => CoreEvent::FileLoaded,
            MPV_EVENT_PLAYBACK_RESTART => CoreEvent::PlaybackRestart,
            MPV_EVENT_END_FILE if !event.data.is_null() => {
                // SAFETY: END_FILE carries an mpv_event_end_file.
                let end = unsafe { &*(event.data as *const MpvEventEndFile) };
                let reason = EndReason::from_raw(end.reason);
                let error = (reason == EndReason::Error).then(|| self.lib.error_message(end.error));
                CoreEvent::EndFile { reason, error }
            }
            MPV_EVENT_PROPERTY_CHANGE if !event.data.is_null() => {
                // SAFETY: PROPERTY_CHANGE carries an mpv_event_property.
                let prop = unsafe { &*(event.data as *const MpvEventProperty) };
                if prop.name.is_null() {
                    return CoreEvent::Other(event.event_id);
                }
                // SAFETY: name is NUL-terminated and valid until the next wait.
                let name = unsafe { CStr::from_ptr(prop.name) }
                    .to_string_lossy()
                    .into_owned();
                // SAFETY: data matches prop.format.
                let value = unsafe { Self::property_value(prop.format, prop.data) };
                CoreEvent::PropertyChanged { name, value }
            }
            other => CoreEvent::Other(other),
        }
    }
}

impl PlayerCore for MpvClient {
    fn command(&self, args: &[&str]) -> Result<(), CoreError> {
        let owned = args
            .iter()
            .map(|a| c_string(a))
            .collect::<Result<Vec<_>, _>>()?;
        let mut ptrs: Vec<*const c_char> = owned.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(ptr::null());
        // SAFETY: NULL-terminated argv whose strings outlive the call.
        let code = unsafe { (self.lib.api.command)(self.handle, ptrs.as_mut_ptr()) };
        self.lib.check("mpv_command", code)
    }

    fn set_property(&self, name: &str, value: &str) -> Result<(), CoreError> {
        let (n, v) = (c_string(name)?, c_string(value)?);
        // SAFETY: handle is live, strings are NUL-terminated.
        let code = unsafe { (self.lib.api.set_property_string)(self.handle, n.as_ptr(), v.as_ptr()) };
        self.lib.check("mpv_set_property_string", code)
    }

    fn get_f64(&self, name: &str) -> Result<f64, CoreError> {
        self.get_raw::<f64>(name, MPV_FORMAT_DOUBLE)
    }

    fn get_i64(&self, name: &str) -> Result<i64, CoreError> {
        self.get_raw::<i64>(name, MPV_FORMAT_INT64)
    }

    fn observe(&self, id: u64, name: &str, format: PropertyFormat) -> Result<(), CoreError> {
        let n = c_string(name)?;
        // SAFETY: handle is live, name is NUL-terminated.
        let code = unsafe { (self.lib.api.observe_property)(self.handle, id, n.as_ptr(), format.raw()) };
        self.lib.check("mpv_observe_property", code)
    }

    fn wait_event(&self, timeout_secs: f64) -> CoreEvent {
        // SAFETY: handle is live; the returned event is valid until the next
        // call, and it is fully translated before returning.
        let event = unsafe { (self.lib.api.wait_event)(self.handle, timeout_secs) };
        if event.is_null() {
            return CoreEvent::None;
        }
        // SAFETY: non-null events point at mpv-owned storage.
        self.translate(unsafe { &*event })
    }

    fn wakeup(&self) {
        // SAFETY: handle is live.
        unsafe { (self.lib.api.wakeup)(self.handle) }
    }

    fn attach_renderer(&self, loader: GlLoader, on_update: UpdateCallback) -> Result<(), CoreError> {
        let mut renderer = self.renderer.lock();
        if renderer.is_none() {
            *renderer = Some(MpvRenderer::create(
                Arc::clone(&self.lib),
                self.handle,
                loader,
                on_update,
            )?);
        }
        Ok(())
    }

    fn render(&self, target: GlTarget) -> Result<bool, CoreError> {
        match self.renderer.lock().as_ref() {
            Some(renderer) => renderer.render(target),
            None => Ok(false),
        }
    }
}

impl Drop for MpvClient {
    fn drop(&mut self) {
        // The render context must go before the core.
        self.renderer.lock().take();
        // SAFETY: handle is live and never used again.
        unsafe { (self.lib.api.terminate_destroy)(self.handle) };
        debug!("libmpv client destroyed");
    }
}

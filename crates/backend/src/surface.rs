//! Render surface supplied by the collaborator.
//!
//! The core never owns the window or view. It draws into whatever the
//! surface hands out and calls [`RenderSurface::frame_ready`] afterwards.
//! Surface methods are only ever called on the designated thread.

use std::ffi::{c_char, c_void};

use vl_common::MediaTime;
use vl_effects::RgbaImage;

/// OpenGL function loader (`get_proc_address`) for the libmpv renderer.
pub type GetProcAddressFn = unsafe extern "C" fn(ctx: *mut c_void, name: *const c_char) -> *mut c_void;

/// GL loader plus its opaque context pointer.
#[derive(Clone, Copy, Debug)]
pub struct GlLoader {
    pub get_proc_address: GetProcAddressFn,
    pub context: *mut c_void,
}

// SAFETY: the loader is a plain C function pointer and the context pointer
// is only handed back to that function. libmpv calls it from the thread
// that renders, which is the designated thread.
unsafe impl Send for GlLoader {}
unsafe impl Sync for GlLoader {}

/// Framebuffer to draw the next frame into. The GL context must be current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlTarget {
    pub fbo: i32,
    pub width: u32,
    pub height: u32,
    pub flip_y: bool,
}

pub trait RenderSurface {
    /// Show a CPU-composited frame (system decoder path).
    fn present(&mut self, frame: &RgbaImage, time: MediaTime);

    /// GL loader for GPU rendering. `None` if the surface is CPU-only.
    fn gl_loader(&self) -> Option<GlLoader> {
        None
    }

    /// Make the GL context current and describe the target framebuffer.
    fn begin_gl_frame(&mut self) -> Option<GlTarget> {
        None
    }

    /// A new frame is on the surface.
    fn frame_ready(&mut self);
}

/// Surface that drops every frame. For headless use.
#[derive(Debug, Default)]
pub struct NullSurface {
    frames: u64,
}

impl NullSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderSurface for NullSurface {
    fn present(&mut self, _frame: &RgbaImage, _time: MediaTime) {}

    fn frame_ready(&mut self) {
        self.frames += 1;
    }
}

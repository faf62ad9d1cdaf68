//! OpenGL render context over a libmpv handle.

use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::Arc;

use tracing::debug;

use super::ffi::{
    MpvHandle, MpvLibrary, MpvOpenGlFbo, MpvOpenGlInitParams, MpvRenderContext, MpvRenderParam,
    MPV_RENDER_API_TYPE_OPENGL, MPV_RENDER_PARAM_API_TYPE, MPV_RENDER_PARAM_FLIP_Y,
    MPV_RENDER_PARAM_INVALID, MPV_RENDER_PARAM_OPENGL_FBO, MPV_RENDER_PARAM_OPENGL_INIT_PARAMS,
    MPV_RENDER_UPDATE_FRAME,
};
use crate::error::CoreError;
use crate::surface::{GlLoader, GlTarget};

type UpdateCallback = Box<dyn Fn() + Send + Sync>;

extern "C" fn update_trampoline(cb_ctx: *mut c_void) {
    if cb_ctx.is_null() {
        return;
    }
    // SAFETY: cb_ctx is the `UpdateCallback` boxed in `MpvRenderer::create`,
    // alive until the callback is cleared in `Drop`.
    let callback = unsafe { &*(cb_ctx as *const UpdateCallback) };
    callback();
}

pub struct MpvRenderer {
    lib: Arc<MpvLibrary>,
    ctx: *mut MpvRenderContext,
    callback: *mut UpdateCallback,
}

// SAFETY: the render context is only used from the designated thread; the
// update callback it invokes from mpv's threads is Send + Sync.
unsafe impl Send for MpvRenderer {}

impl MpvRenderer {
    pub fn create(
        lib: Arc<MpvLibrary>,
        handle: *mut MpvHandle,
        loader: GlLoader,
        on_update: UpdateCallback,
    ) -> Result<Self, CoreError> {
        let mut init = MpvOpenGlInitParams {
            get_proc_address: Some(loader.get_proc_address),
            get_proc_address_ctx: loader.context,
        };
        let mut params = [
            MpvRenderParam {
                param_type: MPV_RENDER_PARAM_API_TYPE,
                data: MPV_RENDER_API_TYPE_OPENGL.as_ptr() as *mut c_void,
            },
            MpvRenderParam {
                param_type: MPV_RENDER_PARAM_OPENGL_INIT_PARAMS,
                data: &mut init as *mut MpvOpenGlInitParams as *mut c_void,
            },
            MpvRenderParam {
                param_type: MPV_RENDER_PARAM_INVALID,
                data: ptr::null_mut(),
            },
        ];

        let mut ctx: *mut MpvRenderContext = ptr::null_mut();
        // SAFETY: params is terminated by MPV_RENDER_PARAM_INVALID and lives
        // across the call; handle is a live, initialized mpv handle.
        let code = unsafe { (lib.api.render_context_create)(&mut ctx, handle, params.as_mut_ptr()) };
        lib.check("mpv_render_context_create", code)?;
        if ctx.is_null() {
            return Err(CoreError::Render("mpv_render_context_create returned null".into()));
        }

        let callback = Box::into_raw(Box::new(on_update));
        // SAFETY: callback stays valid until cleared in Drop.
        unsafe {
            (lib.api.render_context_set_update_callback)(
                ctx,
                Some(update_trampoline),
                callback as *mut c_void,
            );
        }
        debug!("libmpv render context created");

        Ok(Self { lib, ctx, callback })
    }

    /// Draw into `target` if mpv has a new frame. Returns whether it drew.
    pub fn render(&self, target: GlTarget) -> Result<bool, CoreError> {
        // SAFETY: ctx is live for the lifetime of self.
        let flags = unsafe { (self.lib.api.render_context_update)(self.ctx) };
        if flags & MPV_RENDER_UPDATE_FRAME == 0 {
            return Ok(false);
        }

        let mut fbo = MpvOpenGlFbo {
            fbo: target.fbo,
            w: target.width as c_int,
            h: target.height as c_int,
            internal_format: 0,
        };
        let mut flip: c_int = target.flip_y.into();
        let mut params = [
            MpvRenderParam {
                param_type: MPV_RENDER_PARAM_OPENGL_FBO,
                data: &mut fbo as *mut MpvOpenGlFbo as *mut c_void,
            },
            MpvRenderParam {
                param_type: MPV_RENDER_PARAM_FLIP_Y,
                data: &mut flip as *mut c_int as *mut c_void,
            },
            MpvRenderParam {
                param_type: MPV_RENDER_PARAM_INVALID,
                data: ptr::null_mut(),
            },
        ];
        // SAFETY: terminated param list; the caller made the GL context current.
        let code = unsafe { (self.lib.api.render_context_render)(self.ctx, params.as_mut_ptr()) };
        self.lib.check("mpv_render_context_render", code)?;
        // SAFETY: ctx is live.
        unsafe { (self.lib.api.render_context_report_swap)(self.ctx) };
        Ok(true)
    }
}

impl Drop for MpvRenderer {
    fn drop(&mut self) {
        // SAFETY: clear the callback before freeing so mpv stops calling it,
        // then release the box we leaked in `create`.
        unsafe {
            (self.lib.api.render_context_set_update_callback)(self.ctx, None, ptr::null_mut());
            (self.lib.api.render_context_free)(self.ctx);
            drop(Box::from_raw(self.callback));
        }
    }
}

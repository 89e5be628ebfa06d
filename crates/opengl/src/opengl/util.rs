use glow::{
    DEBUG_OUTPUT, DEBUG_OUTPUT_SYNCHRONOUS, DEBUG_SEVERITY_HIGH, DEBUG_SEVERITY_MEDIUM, DEBUG_SEVERITY_NOTIFICATION,
    HasContext,
};

/// Forwards driver debug messages to `log`. Only active in debug builds.
pub fn enable_debug(gl: &mut impl HasContext) {
    if !cfg!(debug_assertions) {
        return;
    }

    unsafe {
        gl.enable(DEBUG_OUTPUT);
        gl.enable(DEBUG_OUTPUT_SYNCHRONOUS);
        gl.debug_message_callback(|_, _, id, severity, message| match severity {
            DEBUG_SEVERITY_HIGH => log::error!("gl {id}: {message}"),
            DEBUG_SEVERITY_MEDIUM => log::warn!("gl {id}: {message}"),
            DEBUG_SEVERITY_NOTIFICATION => log::trace!("gl {id}: {message}"),
            _ => log::debug!("gl {id}: {message}"),
        });
    }
}

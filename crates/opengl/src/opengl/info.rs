use glow::{
    HasContext, MAX_COMBINED_TEXTURE_IMAGE_UNITS, MAX_COMPUTE_WORK_GROUP_INVOCATIONS, MAX_SHADER_STORAGE_BUFFER_BINDINGS,
    MAX_UNIFORM_BLOCK_SIZE,
};
use std::collections::HashSet;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GlInfo {
    pub version: (u32, u32),
    pub is_gles: bool,

    pub vendor: String,
    pub extensions: HashSet<String>,

    pub max_texture_units: u32,
    pub max_uniform_block_size_bytes: u32,
    pub max_storage_buffer_bindings: u32,
    pub max_compute_invocations: u32,
}

impl GlInfo {
    pub fn query(gl: &impl HasContext) -> Self {
        unsafe {
            let version = gl.version();
            let max_texture_units = gl.get_parameter_i32(MAX_COMBINED_TEXTURE_IMAGE_UNITS) as u32;
            let max_uniform_block_size = gl.get_parameter_i32(MAX_UNIFORM_BLOCK_SIZE) as u32;
            let max_storage_buffer_bindings = gl.get_parameter_i32(MAX_SHADER_STORAGE_BUFFER_BINDINGS) as u32;
            let max_compute_invocations = gl.get_parameter_i32(MAX_COMPUTE_WORK_GROUP_INVOCATIONS) as u32;

            Self {
                version: (version.major, version.minor),
                is_gles: version.is_embedded,

                vendor: version.vendor_info.clone(),
                extensions: gl.supported_extensions().clone(),

                max_texture_units,
                max_uniform_block_size_bytes: max_uniform_block_size,
                max_storage_buffer_bindings,
                max_compute_invocations,
            }
        }
    }

    /// Capabilities of an ideal desktop OpenGL 4.6 context.
    pub fn headless() -> Self {
        Self {
            version: (4, 6),
            is_gles: false,

            vendor: String::from("headless"),
            extensions: HashSet::new(),

            max_texture_units: 32,
            max_uniform_block_size_bytes: 65536,
            max_storage_buffer_bindings: 16,
            max_compute_invocations: 1024,
        }
    }

    pub fn glsl_version(&self) -> u32 {
        if self.is_gles {
            if self.version >= (3, 0) {
                self.version.0 * 100 + self.version.1 * 10
            } else {
                100
            }
        } else if self.version >= (3, 3) {
            self.version.0 * 100 + self.version.1 * 10
        } else if self.version >= (3, 2) {
            150
        } else if self.version >= (3, 1) {
            140
        } else {
            130
        }
    }

    /// Compute shaders, storage buffers and explicit `layout(binding=..)` qualifiers.
    pub(crate) fn is_baseline_supported(&self) -> bool {
        if self.is_gles {
            self.version >= (3, 1)
        } else {
            self.version >= (4, 3) || self.extensions.contains("GL_ARB_compute_shader")
        }
    }
}

use super::{GlInfo, enable_debug};
use glow::{
    COMPUTE_SHADER, FRAGMENT_SHADER, HasContext, NativeBuffer, NativeProgram, NativeShader, NativeTexture,
    NativeUniformLocation, SHADER_STORAGE_BUFFER, TEXTURE_2D, TEXTURE0, UNIFORM_BUFFER, VERTEX_SHADER,
};
use glshade_core::StageKind;
use std::{ffi::CStr, num::NonZeroU32};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderName(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramName(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Uniform,
    ShaderStorage,
}

/// A value for a single non-opaque uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UInt(u32),
    UVec2([u32; 2]),
    UVec3([u32; 3]),
    UVec4([u32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

/// The slice of OpenGL the shader compiler and property binding need.
///
/// All calls happen on the thread that owns the GL context.
pub trait GlDevice {
    fn info(&self) -> &GlInfo;

    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderName, String>;
    /// Uploads the source and compiles it. Returns the compile status.
    fn compile_shader(&mut self, shader: ShaderName, source: &str) -> bool;
    fn shader_info_log(&self, shader: ShaderName) -> String;
    fn delete_shader(&mut self, shader: ShaderName);

    fn create_program(&mut self) -> Result<ProgramName, String>;
    fn attach_shader(&mut self, program: ProgramName, shader: ShaderName);
    fn detach_shader(&mut self, program: ProgramName, shader: ShaderName);
    /// Returns the link status.
    fn link_program(&mut self, program: ProgramName) -> bool;
    fn program_info_log(&self, program: ProgramName) -> String;
    fn delete_program(&mut self, program: ProgramName);
    fn use_program(&mut self, program: Option<ProgramName>);

    fn uniform_location(&self, program: ProgramName, name: &str) -> Option<UniformLocation>;
    fn uniform_block_index(&self, program: ProgramName, name: &str) -> Option<u32>;
    fn storage_block_index(&self, program: ProgramName, name: &str) -> Option<u32>;

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
    fn bind_texture_unit(&mut self, unit: u32, texture: NonZeroU32);
    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: NonZeroU32);
}

/// [`GlDevice`] over a native OpenGL context.
pub struct GlowDevice {
    gl: glow::Context,
    info: GlInfo,
}

impl GlowDevice {
    /// Creates a device from a given loader function
    /// (a function that takes a GL function name and returns a pointer to that function).
    ///
    /// #### Safety
    /// This function should be called only if the OpenGL context is currently active for the current thread.
    pub unsafe fn new<F>(loader: F) -> Self
    where
        F: FnMut(&CStr) -> *const std::os::raw::c_void,
    {
        unsafe { Self::from_glow(glow::Context::from_loader_function_cstr(loader)) }
    }

    /// #### Safety
    /// This function should be called only if the OpenGL context is currently active for the current thread.
    pub unsafe fn from_glow(mut gl: glow::Context) -> Self {
        let info = GlInfo::query(&gl);

        if cfg!(debug_assertions) {
            enable_debug(&mut gl);
        }

        Self { gl, info }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

fn shader(name: ShaderName) -> NativeShader {
    NativeShader(name.0)
}

fn program(name: ProgramName) -> NativeProgram {
    NativeProgram(name.0)
}

impl GlDevice for GlowDevice {
    fn info(&self) -> &GlInfo {
        &self.info
    }

    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderName, String> {
        let kind = match stage {
            StageKind::Vertex => VERTEX_SHADER,
            StageKind::Fragment => FRAGMENT_SHADER,
            StageKind::Compute => COMPUTE_SHADER,
        };

        unsafe { self.gl.create_shader(kind).map(|s| ShaderName(s.0)) }
    }

    fn compile_shader(&mut self, name: ShaderName, source: &str) -> bool {
        unsafe {
            self.gl.shader_source(shader(name), source);
            self.gl.compile_shader(shader(name));
            self.gl.get_shader_compile_status(shader(name))
        }
    }

    fn shader_info_log(&self, name: ShaderName) -> String {
        unsafe { self.gl.get_shader_info_log(shader(name)) }
    }

    fn delete_shader(&mut self, name: ShaderName) {
        unsafe { self.gl.delete_shader(shader(name)) }
    }

    fn create_program(&mut self) -> Result<ProgramName, String> {
        unsafe { self.gl.create_program().map(|p| ProgramName(p.0)) }
    }

    fn attach_shader(&mut self, name: ProgramName, shader_name: ShaderName) {
        unsafe { self.gl.attach_shader(program(name), shader(shader_name)) }
    }

    fn detach_shader(&mut self, name: ProgramName, shader_name: ShaderName) {
        unsafe { self.gl.detach_shader(program(name), shader(shader_name)) }
    }

    fn link_program(&mut self, name: ProgramName) -> bool {
        unsafe {
            self.gl.link_program(program(name));
            self.gl.get_program_link_status(program(name))
        }
    }

    fn program_info_log(&self, name: ProgramName) -> String {
        unsafe { self.gl.get_program_info_log(program(name)) }
    }

    fn delete_program(&mut self, name: ProgramName) {
        unsafe { self.gl.delete_program(program(name)) }
    }

    fn use_program(&mut self, name: Option<ProgramName>) {
        unsafe { self.gl.use_program(name.map(program)) }
    }

    fn uniform_location(&self, name: ProgramName, uniform: &str) -> Option<UniformLocation> {
        unsafe { self.gl.get_uniform_location(program(name), uniform).map(|l| UniformLocation(l.0)) }
    }

    fn uniform_block_index(&self, name: ProgramName, block: &str) -> Option<u32> {
        unsafe { self.gl.get_uniform_block_index(program(name), block) }
    }

    fn storage_block_index(&self, name: ProgramName, block: &str) -> Option<u32> {
        unsafe { self.gl.get_shader_storage_block_index(program(name), block) }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let location = NativeUniformLocation(location.0);
        let location = Some(&location);

        unsafe {
            match value {
                UniformValue::Float(x) => self.gl.uniform_1_f32(location, x),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32_slice(location, &v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32_slice(location, &v),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32_slice(location, &v),
                UniformValue::Int(x) => self.gl.uniform_1_i32(location, x),
                UniformValue::IVec2(v) => self.gl.uniform_2_i32_slice(location, &v),
                UniformValue::IVec3(v) => self.gl.uniform_3_i32_slice(location, &v),
                UniformValue::IVec4(v) => self.gl.uniform_4_i32_slice(location, &v),
                UniformValue::UInt(x) => self.gl.uniform_1_u32(location, x),
                UniformValue::UVec2(v) => self.gl.uniform_2_u32_slice(location, &v),
                UniformValue::UVec3(v) => self.gl.uniform_3_u32_slice(location, &v),
                UniformValue::UVec4(v) => self.gl.uniform_4_u32_slice(location, &v),
                UniformValue::Mat2(m) => self.gl.uniform_matrix_2_f32_slice(location, false, &m),
                UniformValue::Mat3(m) => self.gl.uniform_matrix_3_f32_slice(location, false, &m),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(location, false, &m),
            }
        }
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: NonZeroU32) {
        unsafe {
            self.gl.active_texture(TEXTURE0 + unit);
            self.gl.bind_texture(TEXTURE_2D, Some(NativeTexture(texture)));
        }
    }

    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: NonZeroU32) {
        let target = match target {
            BufferTarget::Uniform => UNIFORM_BUFFER,
            BufferTarget::ShaderStorage => SHADER_STORAGE_BUFFER,
        };

        unsafe { self.gl.bind_buffer_base(target, index, Some(NativeBuffer(buffer))) }
    }
}

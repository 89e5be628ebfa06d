use super::{BufferTarget, GlDevice, GlInfo, ProgramName, ShaderName, UniformLocation, UniformValue};
use glshade_core::StageKind;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{cell::RefCell, num::NonZeroU32};

/// A state change recorded by [`HeadlessDevice`].
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    UseProgram(Option<ProgramName>),
    SetUniform(UniformLocation, UniformValue),
    BindTexture { unit: u32, texture: NonZeroU32 },
    BindBuffer { target: BufferTarget, index: u32, buffer: NonZeroU32 },
}

struct HeadlessShader {
    stage: StageKind,
    source: String,
}

#[derive(Default)]
struct HeadlessProgram {
    attached: Vec<ShaderName>,
    locations: RefCell<FxHashMap<String, u32>>,
}

/// A [`GlDevice`] without a GPU.
///
/// Every source compiles and links unless told otherwise. Sources, compile and link counts and
/// binding calls are recorded so shader generation can run offline.
pub struct HeadlessDevice {
    info: GlInfo,
    next_name: u32,

    shaders: FxHashMap<NonZeroU32, HeadlessShader>,
    programs: FxHashMap<NonZeroU32, HeadlessProgram>,

    failing_marker: Option<String>,
    failing_link: bool,
    eliminated: FxHashSet<String>,

    compile_count: usize,
    link_count: usize,
    sources: Vec<(StageKind, String)>,
    calls: Vec<DeviceCall>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::with_info(GlInfo::headless())
    }

    pub fn with_info(info: GlInfo) -> Self {
        Self {
            info,
            next_name: 0,
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
            failing_marker: None,
            failing_link: false,
            eliminated: FxHashSet::default(),
            compile_count: 0,
            link_count: 0,
            sources: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Any shader whose source contains `marker` fails to compile.
    pub fn fail_compile_on(&mut self, marker: impl Into<String>) {
        self.failing_marker = Some(marker.into());
    }

    pub fn fail_link(&mut self, fail: bool) {
        self.failing_link = fail;
    }

    /// Pretend the driver optimized away the uniform or block called `name`.
    pub fn eliminate(&mut self, name: impl Into<String>) {
        self.eliminated.insert(name.into());
    }

    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    /// Every source handed to the compiler, in order.
    pub fn sources(&self) -> &[(StageKind, String)] {
        &self.sources
    }

    pub fn last_source(&self, stage: StageKind) -> Option<&str> {
        self.sources
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, source)| source.as_str())
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn allocate(&mut self) -> NonZeroU32 {
        self.next_name += 1;
        NonZeroU32::new(self.next_name).unwrap_or(NonZeroU32::MIN)
    }

    fn location(&self, program: ProgramName, name: &str) -> Option<u32> {
        if self.eliminated.contains(name) {
            return None;
        }

        let program = self.programs.get(&program.0)?;
        let mut locations = program.locations.borrow_mut();
        let next = locations.len() as u32;
        Some(*locations.entry(name.to_string()).or_insert(next))
    }
}

impl GlDevice for HeadlessDevice {
    fn info(&self) -> &GlInfo {
        &self.info
    }

    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderName, String> {
        let name = self.allocate();
        self.shaders.insert(
            name,
            HeadlessShader {
                stage,
                source: String::new(),
            },
        );
        Ok(ShaderName(name))
    }

    fn compile_shader(&mut self, shader: ShaderName, source: &str) -> bool {
        let Some(entry) = self.shaders.get_mut(&shader.0) else {
            return false;
        };

        entry.source = source.to_string();
        self.compile_count += 1;
        self.sources.push((entry.stage, entry.source.clone()));

        match &self.failing_marker {
            Some(marker) => !source.contains(marker.as_str()),
            None => true,
        }
    }

    fn shader_info_log(&self, shader: ShaderName) -> String {
        match (self.shaders.get(&shader.0), &self.failing_marker) {
            (Some(entry), Some(marker)) if entry.source.contains(marker.as_str()) => {
                format!("0:1(1): error: rejected `{marker}`")
            }
            _ => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: ShaderName) {
        self.shaders.remove(&shader.0);
    }

    fn create_program(&mut self) -> Result<ProgramName, String> {
        let name = self.allocate();
        self.programs.insert(name, HeadlessProgram::default());
        Ok(ProgramName(name))
    }

    fn attach_shader(&mut self, program: ProgramName, shader: ShaderName) {
        if let Some(program) = self.programs.get_mut(&program.0) {
            program.attached.push(shader);
        }
    }

    fn detach_shader(&mut self, program: ProgramName, shader: ShaderName) {
        if let Some(program) = self.programs.get_mut(&program.0) {
            program.attached.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: ProgramName) -> bool {
        self.link_count += 1;
        let attached = self.programs.get(&program.0).is_some_and(|p| !p.attached.is_empty());
        attached && !self.failing_link
    }

    fn program_info_log(&self, _program: ProgramName) -> String {
        if self.failing_link {
            String::from("error: linking rejected")
        } else {
            String::new()
        }
    }

    fn delete_program(&mut self, program: ProgramName) {
        self.programs.remove(&program.0);
    }

    fn use_program(&mut self, program: Option<ProgramName>) {
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramName, name: &str) -> Option<UniformLocation> {
        self.location(program, name).map(UniformLocation)
    }

    fn uniform_block_index(&self, program: ProgramName, name: &str) -> Option<u32> {
        self.location(program, name)
    }

    fn storage_block_index(&self, program: ProgramName, name: &str) -> Option<u32> {
        self.location(program, name)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.calls.push(DeviceCall::SetUniform(location, value));
    }

    fn bind_texture_unit(&mut self, unit: u32, texture: NonZeroU32) {
        self.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: NonZeroU32) {
        self.calls.push(DeviceCall::BindBuffer { target, index, buffer });
    }
}

use crate::{
    CompiledProgram, ShaderError,
    compiler::{self, CompileContext, ShaderKey},
    opengl::GlDevice,
};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Compiled programs by everything that shaped their source.
///
/// Owns every program it returns; evicting an entry deletes its GPU program.
#[derive(Default)]
pub struct ShaderCache {
    programs: FxHashMap<ShaderKey, Rc<CompiledProgram>>,
    compile_count: usize,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached program for `key`, compiling it on a miss. Failures are not cached.
    pub fn retrieve(&mut self, key: &ShaderKey, ctx: &mut CompileContext<'_>) -> Result<Rc<CompiledProgram>, ShaderError> {
        if let Some(program) = self.programs.get(key) {
            log::debug!("shader cache hit for {:016x}", key.hash_code());
            return Ok(Rc::clone(program));
        }

        let stages = key.params().stages();
        self.compile_count += 1;
        let program = Rc::new(compiler::compile(ctx, &stages, key.params().desired())?);

        self.programs.insert(key.clone(), Rc::clone(&program));
        Ok(program)
    }

    pub fn get(&self, key: &ShaderKey) -> Option<&Rc<CompiledProgram>> {
        self.programs.get(key)
    }

    pub fn evict(&mut self, key: &ShaderKey, device: &mut dyn GlDevice) -> bool {
        match self.programs.remove(key) {
            Some(program) => {
                device.delete_program(program.program());
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, device: &mut dyn GlDevice) {
        for (_, program) in self.programs.drain() {
            device.delete_program(program.program());
        }
    }

    /// Number of compiles attempted, including failed ones.
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

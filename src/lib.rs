//! GLSL shader pipeline compiler.
//!
//! Shader tasks declare the properties they read and write. A pipeline resolver
//! orders them into stages, and the OpenGL backend turns those stages into a
//! linked program with every property bound to a uniform, a buffer block, a
//! vertex attribute or a stage varying.

pub use glshade_core::*;

#[cfg(feature = "opengl")]
pub use glshade_opengl as opengl;

#[cfg(feature = "derive")]
pub use glshade_derive::GlslStruct;

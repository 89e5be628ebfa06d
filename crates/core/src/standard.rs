//! Names of the properties every renderer understands.

pub const POSITION: &str = "position";
pub const NORMAL: &str = "normal";
pub const COORD_BASE: &str = "coord_base";

/// Clip space vertex position written by the vertex stage.
pub const POSITION_VIEW: &str = "position_view";

pub const FRAGMENT_COLOR: &str = "fragment_color";

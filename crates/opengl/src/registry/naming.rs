use rustc_hash::FxHasher;
use std::{
    fmt::Write,
    hash::{Hash, Hasher},
};

/// Turns a host type name into a valid GLSL identifier.
///
/// `<`, `>`, `*` and `,` map to `4`, `7`, `2` and `__`; any other character that is not an ASCII
/// letter or digit is dropped. A changed name gets a hash suffix so distinct host names stay distinct.
pub fn convert_to_glsl_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut modified = false;

    for c in name.chars() {
        match c {
            '<' => out.push('4'),
            '>' => out.push('7'),
            '*' => out.push('2'),
            ',' => out.push_str("__"),
            c if c.is_ascii_alphanumeric() => {
                out.push(c);
                continue;
            }
            _ => {}
        }

        modified = true;
    }

    if modified {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        write!(out, "_{:x}", hasher.finish()).ok();
    }

    out
}

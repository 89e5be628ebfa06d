use std::{fs, path::Path};

/// Writes a stage's source and task graph next to each other as `<prefix><id>.glsl` and `.dot`.
pub(crate) fn dump_stage(dir: &Path, prefix: &str, id: &str, source: &str, graph: &str) {
    if let Err(err) = fs::create_dir_all(dir) {
        log::warn!("unable to create shader dump directory {}: {err}", dir.display());
        return;
    }

    for (extension, contents) in [("glsl", source), ("dot", graph)] {
        let path = dir.join(format!("{prefix}{id}.{extension}"));
        match fs::write(&path, contents) {
            Ok(()) => log::info!("wrote {}", path.display()),
            Err(err) => log::warn!("unable to write {}: {err}", path.display()),
        }
    }
}

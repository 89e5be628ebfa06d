use super::{Pipeline, PipelineResolver};
use crate::ParamAliases;
use rustc_hash::FxHasher;
use std::{
    fmt::Write,
    hash::{Hash, Hasher},
};

/// Deterministic identifier of a resolved pipeline, used to name debug dumps.
pub fn pipeline_id(pipeline: &Pipeline, resolver: &dyn PipelineResolver, aliases: &ParamAliases) -> String {
    let mut hasher = FxHasher::default();
    aliases.hash(&mut hasher);

    for key in &pipeline.items {
        if let Some(task) = resolver.task(*key) {
            task.friendly_name().hash(&mut hasher);
        }
    }

    for (label, list) in pipeline.classes() {
        label.hash(&mut hasher);
        for spec in list {
            spec.name.as_str().hash(&mut hasher);
        }
    }

    format!("{:016x}", hasher.finish())
}

/// Renders the task graph of a pipeline in Graphviz dot format.
pub fn export_dot(pipeline: &Pipeline, resolver: &dyn PipelineResolver, aliases: &ParamAliases) -> String {
    let mut out = String::new();
    writeln!(out, "digraph pipeline {{").ok();
    writeln!(out, "\trankdir=LR;").ok();

    for (label, list) in pipeline.classes() {
        for spec in list {
            writeln!(
                out,
                "\t\"p_{name}\" [label=\"{name}: {ty:?}\\n({label})\", shape=ellipse];",
                name = spec.name,
                ty = spec.type_info,
            )
            .ok();
        }
    }

    for (index, key) in pipeline.items.iter().enumerate() {
        let Some(task) = resolver.task(*key) else {
            continue;
        };

        let name = task.friendly_name().replace('"', "\\\"");
        writeln!(out, "\t\"t_{index}\" [label=\"{name}\", shape=box];").ok();

        for spec in task.input_specs() {
            writeln!(out, "\t\"p_{}\" -> \"t_{index}\";", aliases.choice_for(spec.name)).ok();
        }
        for spec in task.consuming_specs() {
            writeln!(out, "\t\"p_{}\" -> \"t_{index}\" [style=dashed];", aliases.choice_for(spec.name)).ok();
        }
        for spec in task.filter_specs() {
            writeln!(out, "\t\"p_{}\" -> \"t_{index}\" [dir=both];", aliases.choice_for(spec.name)).ok();
        }
        for spec in task.output_specs() {
            writeln!(out, "\t\"t_{index}\" -> \"p_{}\";", aliases.choice_for(spec.name)).ok();
        }
    }

    writeln!(out, "}}").ok();
    out
}

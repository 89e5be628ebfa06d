use super::{Pipeline, PipelineResolver, StageFlags, StageKind};
use crate::{ParamAliases, ParamList, ParamSpec, ResolveError, ShaderTask, StringId, TaskKey};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SecondaryMap, SlotMap};

/// A collection of tasks that resolves pipelines by searching backwards from the desired outputs.
///
/// Each required property is produced by the first registered task (for the stage) that outputs it.
/// Properties nobody produces become stage inputs.
#[derive(Default)]
pub struct MethodCollection {
    tasks: SlotMap<TaskKey, Box<dyn ShaderTask>>,
    stages: SecondaryMap<TaskKey, StageFlags>,
    order: Vec<TaskKey>,
}

impl MethodCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: impl ShaderTask + 'static, stages: StageFlags) -> TaskKey {
        self.register_boxed(Box::new(task), stages)
    }

    pub fn register_boxed(&mut self, task: Box<dyn ShaderTask>, stages: StageFlags) -> TaskKey {
        let key = self.tasks.insert(task);
        self.stages.insert(key, stages);
        self.order.push(key);
        key
    }

    pub fn remove(&mut self, key: TaskKey) -> Option<Box<dyn ShaderTask>> {
        self.stages.remove(key);
        self.order.retain(|k| *k != key);
        self.tasks.remove(key)
    }

    /// First task registered for `stage` that outputs `name` after alias choice.
    pub fn find_producer(&self, stage: StageKind, name: StringId, aliases: &ParamAliases) -> Option<TaskKey> {
        self.order.iter().copied().find(|&key| {
            let in_stage = self.stages.get(key).is_some_and(|s| s.contains(stage.flag()));
            in_stage && self.tasks[key].output_specs().names().any(|n| aliases.choice_for(n) == name)
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl PipelineResolver for MethodCollection {
    fn resolve(&self, stage: StageKind, desired: &ParamList, aliases: &ParamAliases) -> Result<Pipeline, ResolveError> {
        let pipeline = Resolution {
            methods: self,
            stage,
            aliases,
            pipeline: Pipeline::default(),
            produced: FxHashMap::default(),
            produced_order: Vec::new(),
            external: FxHashSet::default(),
            done: FxHashSet::default(),
            visiting: Vec::new(),
        }
        .run(desired)?;

        log::trace!(
            "resolved {stage} pipeline: {} tasks, {} inputs, {} outputs",
            pipeline.items.len(),
            pipeline.input_specs.len(),
            pipeline.output_specs.len()
        );

        Ok(pipeline)
    }

    fn task(&self, key: TaskKey) -> Option<&dyn ShaderTask> {
        self.tasks.get(key).map(|t| t.as_ref())
    }
}

struct Resolution<'a> {
    methods: &'a MethodCollection,
    stage: StageKind,
    aliases: &'a ParamAliases,
    pipeline: Pipeline,

    produced: FxHashMap<StringId, ParamSpec>,
    produced_order: Vec<StringId>,
    external: FxHashSet<StringId>,
    done: FxHashSet<TaskKey>,
    visiting: Vec<TaskKey>,
}

impl<'a> Resolution<'a> {
    fn run(mut self, desired: &ParamList) -> Result<Pipeline, ResolveError> {
        for spec in desired {
            self.require(self.chosen(spec))?;
        }

        for spec in desired {
            let spec = self.chosen(spec);
            if self.produced.contains_key(&spec.name) {
                self.pipeline.output_specs.insert_back(spec);
            } else if let Some(input) = self.pipeline.input_specs.remove(spec.name) {
                self.pipeline.pipethrough_specs.insert_back(input);
            }
        }

        for name in &self.produced_order {
            if !self.pipeline.output_specs.contains(*name) {
                self.pipeline.local_specs.insert_back(self.produced[name]);
            }
        }

        Ok(self.pipeline)
    }

    fn chosen(&self, spec: &ParamSpec) -> ParamSpec {
        spec.renamed(self.aliases.choice_for(spec.name))
    }

    fn require(&mut self, spec: ParamSpec) -> Result<(), ResolveError> {
        if self.produced.contains_key(&spec.name) || self.external.contains(&spec.name) {
            return Ok(());
        }

        match self.methods.find_producer(self.stage, spec.name, self.aliases) {
            Some(key) => self.run_task(key, spec.name),
            None => {
                self.external.insert(spec.name);
                self.pipeline.input_specs.insert_back(spec);
                Ok(())
            }
        }
    }

    fn run_task(&mut self, key: TaskKey, wanted: StringId) -> Result<(), ResolveError> {
        if self.done.contains(&key) {
            return Ok(());
        }

        let methods = self.methods;
        let task = methods.task(key).ok_or(ResolveError::UnknownTask(key))?;
        if self.visiting.contains(&key) {
            return Err(ResolveError::Cycle {
                task: task.friendly_name().to_string(),
                property: wanted,
            });
        }

        self.visiting.push(key);

        for spec in task.consuming_specs() {
            let spec = self.chosen(spec);
            self.require(spec)?;
            self.promote(spec.name, true);
        }

        for spec in task.input_specs() {
            self.require(self.chosen(spec))?;
        }

        for spec in task.filter_specs() {
            let spec = self.chosen(spec);
            self.require(spec)?;
            self.promote(spec.name, false);
        }

        self.visiting.pop();
        self.done.insert(key);
        self.pipeline.items.push(key);

        for spec in task.output_specs() {
            let spec = self.chosen(spec);
            if self.produced.insert(spec.name, spec).is_none() {
                self.produced_order.push(spec.name);
            }
        }

        Ok(())
    }

    /// Moves a stage input into the filter or consuming class. Consuming wins over filter.
    fn promote(&mut self, name: StringId, consuming: bool) {
        if !self.external.contains(&name) {
            return;
        }

        let pipeline = &mut self.pipeline;
        if consuming {
            let spec = pipeline.input_specs.remove(name).or_else(|| pipeline.filter_specs.remove(name));
            if let Some(spec) = spec {
                pipeline.consuming_specs.insert_back(spec);
            }
        } else if let Some(spec) = pipeline.input_specs.remove(name) {
            pipeline.filter_specs.insert_back(spec);
        }
    }
}

use crate::world::World;

/// Stable identifier assigned to a system at registration time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SystemId(u64);

struct SystemEntry<D> {
    id: SystemId,
    func: Box<dyn FnMut(&mut World<D>, &D)>,
}

/// Ordered list of step callbacks, each with a stable id. Registration
/// order is execution order; removal is by identity. Ids are assigned from
/// a counter owned by the pipeline itself, not a process-wide static, so two
/// independent pipelines both start their ids at zero.
pub struct SystemPipeline<D> {
    entries: Vec<SystemEntry<D>>,
    next_id: u64,
}

impl<D> Default for SystemPipeline<D> {
    fn default() -> Self {
        SystemPipeline {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<D> SystemPipeline<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, func: F) -> SystemId
    where
        F: FnMut(&mut World<D>, &D) + 'static,
    {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        self.entries.push(SystemEntry {
            id,
            func: Box::new(func),
        });
        id
    }

    pub fn remove(&mut self, id: SystemId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<SystemEntry<D>> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn append_registered_during_run(&mut self, mut ran: Vec<SystemEntry<D>>) {
        let mut newly_registered = std::mem::take(&mut self.entries);
        ran.append(&mut newly_registered);
        self.entries = ran;
    }
}

/// Runs every system in registration order, recording `latest_system` for
/// diagnostics while each runs, and re-attaches the list afterward so any
/// systems registered mid-step land at the end for the next step.
pub(crate) fn run_all<D>(pipeline_entries: Vec<SystemEntry<D>>, world: &mut World<D>, data: &D) {
    let mut entries = pipeline_entries;
    for entry in entries.iter_mut() {
        world.set_latest_system(Some(entry.id));
        (entry.func)(world, data);
    }
    world.set_latest_system(None);
    world.system_pipeline_mut().append_registered_during_run(entries);
}

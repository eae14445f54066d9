// Counter list controller.
// Each operation reads the bound collection, builds the next one and hands it
// whole to the binding. There are no partial writes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::binding::StoredValue;
use crate::storage::{LocalStorage, StorageResult};

pub const COUNTERS_KEY: &str = "counters";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: String,
    pub name: String,
    pub count: i64,
}

/// Fields to overwrite on a counter. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub count: Option<i64>,
}

impl CounterPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            count: None,
        }
    }

    pub fn count(count: i64) -> Self {
        Self {
            name: None,
            count: Some(count),
        }
    }

    fn apply(&self, counter: &Counter) -> Counter {
        Counter {
            id: counter.id.clone(),
            name: self.name.clone().unwrap_or_else(|| counter.name.clone()),
            count: self.count.unwrap_or(counter.count),
        }
    }
}

/// Moves the element at `from` to `to`, shifting everything in between.
/// `to` past the end lands on the last slot.
fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() {
        return;
    }
    let to = to.min(items.len() - 1);
    let item = items.remove(from);
    items.insert(to, item);
}

pub struct CounterList {
    binding: StoredValue<Vec<Counter>>,
    name_prefix: String,
}

impl CounterList {
    pub fn new(storage: LocalStorage, name_prefix: impl Into<String>) -> Self {
        Self {
            binding: StoredValue::new(storage, COUNTERS_KEY, Some(Vec::new())),
            name_prefix: name_prefix.into(),
        }
    }

    pub fn open(storage: LocalStorage, name_prefix: impl Into<String>) -> Self {
        let mut list = Self::new(storage, name_prefix);
        list.load();
        list
    }

    pub fn load(&mut self) {
        self.binding.load();
    }

    pub fn is_loading(&self) -> bool {
        self.binding.is_loading()
    }

    /// Message of the last failed read or write, cleared by the next successful write.
    pub fn error(&self) -> Option<&str> {
        self.binding.error()
    }

    pub fn binding(&self) -> &StoredValue<Vec<Counter>> {
        &self.binding
    }

    pub fn counters(&self) -> &[Counter] {
        self.binding.value().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, id: &str) -> Option<&Counter> {
        self.counters().iter().find(|c| c.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.counters().iter().position(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.counters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters().is_empty()
    }

    fn commit(&mut self, next: Vec<Counter>) -> StorageResult<()> {
        self.binding.set_value(next)
    }

    pub fn add(&mut self) -> StorageResult<Counter> {
        let current = self.counters();
        let counter = Counter {
            id: Uuid::new_v4().to_string(),
            name: format!("{} {}", self.name_prefix, current.len() + 1),
            count: 0,
        };

        let mut next = current.to_vec();
        next.push(counter.clone());
        self.commit(next)?;

        log::debug!("[Counters] Added '{}' ({})", counter.name, counter.id);
        Ok(counter)
    }

    /// Overwrites the fields present in `patch` on the counter with `id`.
    /// An unknown id still rewrites the collection unchanged.
    pub fn update(&mut self, id: &str, patch: &CounterPatch) -> StorageResult<()> {
        let next = self
            .counters()
            .iter()
            .map(|c| if c.id == id { patch.apply(c) } else { c.clone() })
            .collect();
        self.commit(next)
    }

    pub fn increment(&mut self, id: &str) -> StorageResult<()> {
        self.step(id, 1)
    }

    pub fn decrement(&mut self, id: &str) -> StorageResult<()> {
        self.step(id, -1)
    }

    fn step(&mut self, id: &str, delta: i64) -> StorageResult<()> {
        let count = self.get(id).map(|c| c.count.saturating_add(delta));
        match count {
            Some(count) => self.update(id, &CounterPatch::count(count)),
            None => self.update(id, &CounterPatch::default()),
        }
    }

    /// Renames a counter. Blank names are refused without touching storage.
    pub fn rename(&mut self, id: &str, name: &str) -> StorageResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        self.update(id, &CounterPatch::name(name))?;
        Ok(true)
    }

    pub fn delete(&mut self, id: &str) -> StorageResult<()> {
        let next = self
            .counters()
            .iter()
            .filter(|c| c.id != id)
            .cloned()
            .collect();
        self.commit(next)
    }

    /// Moves the counter at `source` to `target`. Returns whether anything moved.
    pub fn reorder(&mut self, source: usize, target: usize) -> StorageResult<bool> {
        let len = self.len();
        if source >= len || source == target.min(len - 1) {
            return Ok(false);
        }

        let mut next = self.counters().to_vec();
        move_item(&mut next, source, target);
        self.commit(next)?;
        Ok(true)
    }

    /// Drag-end form of `reorder`: drop `active_id` where `over_id` sits.
    pub fn move_counter(&mut self, active_id: &str, over_id: &str) -> StorageResult<bool> {
        if active_id == over_id {
            return Ok(false);
        }
        match (self.index_of(active_id), self.index_of(over_id)) {
            (Some(source), Some(target)) => self.reorder(source, target),
            _ => Ok(false),
        }
    }

    pub fn reset_all(&mut self) -> StorageResult<()> {
        let next = self
            .counters()
            .iter()
            .map(|c| Counter {
                count: 0,
                ..c.clone()
            })
            .collect();
        self.commit(next)
    }

    /// Empties the collection. This also replaces stored counters that could not be read.
    pub fn remove_all(&mut self) -> StorageResult<()> {
        self.binding.overwrite(Vec::new())
    }

    pub fn recover(&mut self) {
        self.binding.recover();
    }
}

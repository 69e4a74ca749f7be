use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::object::Object;

// Environment records live in an arena and point at their parent by handle.
// A closure stores the EnvId it captured, so a function value sitting inside
// the environment it closes over never forms a reference cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvId(usize);

#[derive(Debug, Default)]
struct Record {
    parent: Option<EnvId>,
    values: AHashMap<String, Object>,
}

#[derive(Debug)]
pub struct Environments {
    records: Vec<Record>,
}

impl Environments {
    pub fn new() -> (Self, EnvId) {
        let envs = Environments {
            records: vec![Record::default()],
        };
        (envs, EnvId(0))
    }

    pub fn push_child(&mut self, parent: EnvId) -> EnvId {
        self.records.push(Record {
            parent: Some(parent),
            values: AHashMap::new(),
        });
        EnvId(self.records.len() - 1)
    }

    pub fn get(&self, env: EnvId, name: &str) -> Option<Object> {
        let mut cursor = Some(env);
        while let Some(id) = cursor {
            let record = &self.records[id.0];
            if let Some(value) = record.values.get(name) {
                return Some(value.clone());
            }
            cursor = record.parent;
        }
        None
    }

    pub fn define(&mut self, env: EnvId, name: &str, value: Object) {
        self.records[env.0].values.insert(String::from(name), value);
    }

    // Assignment lands in the scope that owns the name; a name bound nowhere
    // in the chain is created in the current scope.
    pub fn set(&mut self, env: EnvId, name: &str, value: Object) {
        let mut cursor = Some(env);
        while let Some(id) = cursor {
            if self.records[id.0].values.contains_key(name) {
                self.records[id.0].values.insert(String::from(name), value);
                return;
            }
            cursor = self.records[id.0].parent;
        }
        self.define(env, name, value);
    }

    // Flattened view of a chain for the debugger: inner bindings shadow outer
    // ones, names come out sorted so snapshots are deterministic.
    pub fn snapshot(&self, env: EnvId) -> Vec<(String, String)> {
        let mut flat = BTreeMap::new();
        let mut cursor = Some(env);
        while let Some(id) = cursor {
            let record = &self.records[id.0];
            for (name, value) in &record.values {
                flat.entry(name.clone()).or_insert_with(|| value.to_string());
            }
            cursor = record.parent;
        }
        flat.into_iter().collect()
    }
}

//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use modload_api::{BoxError, MaterializeContext, Materializer, Unit, UnitCache};
use modload_core::InMemoryUnitCache;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Materializer that counts executions, records their order, declares
/// configured dependencies, and fails on demand.
#[derive(Default)]
pub struct TestMaterializer {
    pub executions: AtomicUsize,
    pub order: Mutex<Vec<String>>,
    pub failing: Mutex<HashSet<String>>,
    pub dependencies: Mutex<HashMap<String, Vec<String>>>,
    /// Hold each materialization open, to widen concurrency windows.
    pub delay: Option<Duration>,
}

impl TestMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(name: &str) -> Self {
        let materializer = Self::new();
        materializer
            .failing
            .lock()
            .unwrap()
            .insert(name.to_string());
        materializer
    }

    pub fn requires(&self, name: &str, deps: &[&str]) {
        self.dependencies
            .lock()
            .unwrap()
            .insert(name.to_string(), deps.iter().map(|s| s.to_string()).collect());
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn execution_order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

impl Materializer for TestMaterializer {
    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<Unit, BoxError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(ctx.name().to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.lock().unwrap().contains(ctx.name()) {
            return Err(format!("unit {} is broken", ctx.name()).into());
        }
        if let Some(deps) = self.dependencies.lock().unwrap().get(ctx.name()) {
            for dep in deps {
                ctx.declare_dependency(dep)?;
            }
        }
        let mut unit = Unit::new(ctx.name());
        unit.exports.insert(
            "source".to_string(),
            serde_json::Value::String(ctx.locator().display().to_string()),
        );
        Ok(unit)
    }
}

/// Unit cache that records eviction order on top of the in-memory one.
#[derive(Default)]
pub struct RecordingCache {
    inner: InMemoryUnitCache,
    pub evictions: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eviction_order(&self) -> Vec<String> {
        self.evictions.lock().unwrap().clone()
    }
}

impl UnitCache for RecordingCache {
    fn get(&self, name: &str) -> Option<Arc<Unit>> {
        self.inner.get(name)
    }

    fn insert(&self, name: &str, unit: Arc<Unit>) {
        self.inner.insert(name, unit);
    }

    fn evict(&self, name: &str) -> bool {
        self.evictions.lock().unwrap().push(name.to_string());
        self.inner.evict(name)
    }

    fn load_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.inner.load_lock(name)
    }
}

/// Write a unit file, creating parent directories.
pub fn write_unit(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

//! Test doubles for the graph source and the clock

use super::cache::Clock;
use super::model::{GraphSnapshot, ObjectType, SchemaObject};
use super::source::{GraphSource, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory source returning the same object set on every call
pub struct StaticSource {
    clock: Arc<ManualClock>,
    objects: Vec<SchemaObject>,
    definitions: HashMap<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    panic_next: AtomicBool,
}

impl StaticSource {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self::with_objects(
            clock,
            vec![
                SchemaObject::new("Orders", ObjectType::Table),
                SchemaObject::new("Customers", ObjectType::Table),
                SchemaObject::new("vw_Orders", ObjectType::View).depending_on(["Orders"]),
                SchemaObject::new("sp_ReportOrders", ObjectType::Procedure)
                    .depending_on(["vw_Orders", "Orders"]),
                SchemaObject::new("fn_OrderTotal", ObjectType::Function).depending_on(["Orders"]),
            ],
        )
    }

    pub fn with_objects(clock: Arc<ManualClock>, objects: Vec<SchemaObject>) -> Self {
        Self {
            clock,
            objects,
            definitions: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            panic_next: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_definition(mut self, name: &str, text: &str) -> Self {
        self.definitions.insert(name.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl GraphSource for StaticSource {
    async fn generate(&self) -> Result<GraphSnapshot, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("introspection blew up");
        }

        let failure = self.failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(SourceError::IntrospectionFailed(message));
        }

        Ok(GraphSnapshot::new(self.clock.now(), self.objects.clone()))
    }

    async fn definition(&self, name: &str) -> Result<Option<String>, SourceError> {
        Ok(self.definitions.get(name).cloned())
    }
}

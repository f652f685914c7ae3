#![allow(dead_code)]

use std::sync::Once;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route library events to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Structured test log entries, checked for the fields every entry must carry.
#[derive(Default)]
pub struct LogCapture {
    entries: Mutex<Vec<Value>>,
}

impl LogCapture {
    const REQUIRED: [&'static str; 6] = [
        "timestamp",
        "level",
        "test_name",
        "module",
        "result",
        "duration_ms",
    ];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_value(&self, entry: &Value) -> Result<(), String> {
        let Value::Object(fields) = entry else {
            return Err(format!("log entry is not an object: {entry}"));
        };
        if let Some(missing) = Self::REQUIRED.iter().find(|key| !fields.contains_key(**key)) {
            return Err(format!("log entry misses '{missing}'"));
        }
        println!("{entry}");
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    pub fn assert_valid(&self) {
        let entries = self.entries.lock();
        assert!(!entries.is_empty(), "no structured log entry recorded");
        for entry in entries.iter() {
            assert!(
                entry["duration_ms"].is_u64(),
                "duration_ms must be an integer: {entry}"
            );
        }
    }
}

pub struct TestContext {
    test_name: String,
    module: String,
    correlation_id: String,
    capture: LogCapture,
    start_time: Instant,
    assertions_passed: u32,
    assertions_failed: u32,
}

impl TestContext {
    pub fn new(test_name: &str, module: &str) -> Self {
        init_tracing();
        Self {
            test_name: test_name.to_string(),
            module: format!("cti-graphql::{module}"),
            correlation_id: format!("cti-graphql-{}", std::process::id()),
            capture: LogCapture::new(),
            start_time: Instant::now(),
            assertions_passed: 0,
            assertions_failed: 0,
        }
    }

    pub fn assert_true(&mut self, condition: bool, msg: &str) {
        if condition {
            self.assertions_passed += 1;
        } else {
            self.assertions_failed += 1;
            panic!("{}", msg);
        }
    }

    pub fn assert_eq<T: std::fmt::Debug + PartialEq>(&mut self, actual: T, expected: T, msg: &str) {
        if actual == expected {
            self.assertions_passed += 1;
        } else {
            self.assertions_failed += 1;
            panic!("{msg}: expected {expected:?}, got {actual:?}");
        }
    }

    pub fn finalize(&self, result: &str, details: Option<Value>) {
        let duration_ms = u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": "info",
            "test_name": self.test_name,
            "module": self.module,
            "phase": "verify",
            "correlation_id": self.correlation_id,
            "result": result,
            "duration_ms": duration_ms,
            "assertions": {
                "passed": self.assertions_passed,
                "failed": self.assertions_failed
            }
        });

        if let Some(extra) = details {
            entry["details"] = extra;
        }

        self.capture
            .push_value(&entry)
            .expect("structured test log entry");
        self.capture.assert_valid();
    }
}

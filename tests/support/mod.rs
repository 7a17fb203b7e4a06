//! Scripted backend for integration tests.
//!
//! Every operation appends a line to a shared log so tests can assert on
//! execution order. Object kinds mirror a small plotting engine: a canvas
//! that spawns regions and exposes a nested `events` member, and regions
//! that accept drawing methods.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier::{
    Args, Backend, BackendObject, DispatchError, InvokeError, Outcome, ResolutionError,
    ServiceError,
};
use serde_json::{Value, json};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn log_lines(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Index of the first log line equal to `line`, panicking if absent.
pub fn log_position(log: &CallLog, line: &str) -> usize {
    log_lines(log)
        .iter()
        .position(|l| l == line)
        .unwrap_or_else(|| panic!("log line `{line}` not found in {:?}", log_lines(log)))
}

pub struct ScriptedBackend {
    log: CallLog,
    service_calls: Arc<AtomicUsize>,
    fail_service_after: Option<usize>,
}

impl ScriptedBackend {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            service_calls: Arc::new(AtomicUsize::new(0)),
            fail_service_after: None,
        }
    }

    /// Backend whose servicing primitive fails after `calls` invocations,
    /// simulating a closed display.
    pub fn failing_service_after(log: CallLog, calls: usize) -> Self {
        Self {
            log,
            service_calls: Arc::new(AtomicUsize::new(0)),
            fail_service_after: Some(calls),
        }
    }
}

impl Backend for ScriptedBackend {
    fn call(&mut self, name: &str, args: &Args) -> Result<Outcome, DispatchError> {
        self.log.lock().unwrap().push(format!("call:{name}"));
        match name {
            "figure" | "makeCanvas" => Ok(Outcome::Object(Box::new(Canvas::new(self.log.clone())))),
            "version" => Ok(Outcome::Value(json!("7.4.1"))),
            "ping" => Ok(Outcome::Unit),
            "echo" => Ok(Outcome::Value(
                args.positional.first().cloned().unwrap_or(Value::Null),
            )),
            "block" => {
                std::thread::sleep(Duration::from_millis(100));
                Ok(Outcome::Unit)
            }
            "broken" => Err(InvokeError::new("backend op failed").into()),
            _ => Err(ResolutionError::NoSuchFunction(name.to_owned()).into()),
        }
    }

    fn call_style(&mut self, name: &str, _args: &Args) -> Result<Value, DispatchError> {
        self.log.lock().unwrap().push(format!("style:{name}"));
        match name {
            "set_style" => Ok(Value::Null),
            "palette_len" => Ok(json!(6)),
            _ => Err(ResolutionError::NoSuchFunction(name.to_owned()).into()),
        }
    }

    fn service(&mut self, budget: Duration) -> Result<(), ServiceError> {
        let calls = self.service_calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(limit) = self.fail_service_after {
            if calls > limit {
                return Err(ServiceError::new("display closed"));
            }
        }
        // Yield briefly; tests run with millisecond pauses.
        std::thread::sleep(budget.min(Duration::from_millis(2)));
        Ok(())
    }
}

pub struct Canvas {
    log: CallLog,
    events: EventsHub,
    regions: u32,
}

impl Canvas {
    pub fn new(log: CallLog) -> Self {
        Self {
            events: EventsHub { log: log.clone() },
            log,
            regions: 0,
        }
    }
}

impl BackendObject for Canvas {
    fn kind(&self) -> &str {
        "canvas"
    }

    fn member(&mut self, name: &str) -> Result<&mut dyn BackendObject, ResolutionError> {
        match name {
            "events" => Ok(&mut self.events),
            _ => Err(ResolutionError::NoSuchMember {
                owner: "canvas".to_owned(),
                name: name.to_owned(),
            }),
        }
    }

    fn invoke(&mut self, method: &str, _args: &Args) -> Result<Outcome, DispatchError> {
        self.log.lock().unwrap().push(format!("canvas.{method}"));
        match method {
            "add_subplot" | "addRegion" => {
                self.regions += 1;
                Ok(Outcome::Object(Box::new(Region::new(
                    self.log.clone(),
                    self.regions,
                ))))
            }
            "suptitle" => Ok(Outcome::Unit),
            "region_count" => Ok(Outcome::Value(json!(self.regions))),
            _ => Err(ResolutionError::NoSuchMethod {
                owner: "canvas".to_owned(),
                name: method.to_owned(),
            }
            .into()),
        }
    }
}

pub struct EventsHub {
    log: CallLog,
}

impl BackendObject for EventsHub {
    fn kind(&self) -> &str {
        "events"
    }

    fn invoke(&mut self, method: &str, _args: &Args) -> Result<Outcome, DispatchError> {
        match method {
            "connect" => {
                self.log.lock().unwrap().push("events.connect".to_owned());
                Ok(Outcome::Unit)
            }
            _ => Err(ResolutionError::NoSuchMethod {
                owner: "events".to_owned(),
                name: method.to_owned(),
            }
            .into()),
        }
    }
}

pub struct Region {
    log: CallLog,
    id: u32,
    series: u32,
    last_kw: Vec<String>,
}

impl Region {
    pub fn new(log: CallLog, id: u32) -> Self {
        Self {
            log,
            id,
            series: 0,
            last_kw: Vec::new(),
        }
    }

    fn log_call(&self, method: &str, args: &Args) {
        let line = match args.positional.first() {
            Some(value) => format!("region{}.{method}:{value}", self.id),
            None => format!("region{}.{method}", self.id),
        };
        self.log.lock().unwrap().push(line);
    }
}

impl BackendObject for Region {
    fn kind(&self) -> &str {
        "region"
    }

    fn invoke(&mut self, method: &str, args: &Args) -> Result<Outcome, DispatchError> {
        self.log_call(method, args);
        match method {
            "plot" | "draw" | "hist" | "fill_between" => {
                self.series += 1;
                self.last_kw = args.keyword.keys().cloned().collect();
                Ok(Outcome::Unit)
            }
            "legend" => Ok(Outcome::Unit),
            "stats" => Ok(Outcome::Value(json!({
                "series": self.series,
                "last_kw": self.last_kw,
            }))),
            "boom" => Err(InvokeError::new("region exploded").into()),
            _ => Err(ResolutionError::NoSuchMethod {
                owner: "region".to_owned(),
                name: method.to_owned(),
            }
            .into()),
        }
    }
}

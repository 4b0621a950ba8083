use crate::{Host, JsValue};
use std::time::{Duration, Instant};

mod interop;

fn running_host() -> Host {
    let mut host = Host::new();
    host.initialize("jsembed-test", &[])
        .expect("initialize should succeed");
    host
}

fn as_json(host: &mut Host, value: &JsValue) -> serde_json::Value {
    host.to_json(value).expect("value should convert to JSON")
}

fn eval_json(host: &mut Host, source: &str) -> serde_json::Value {
    let value = host.evaluate(source).expect("evaluation should succeed");
    as_json(host, &value)
}

/// Pumps the event loop until nothing is pending
fn drain(host: &mut Host) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while host.process_events().expect("pass should succeed") {
        assert!(Instant::now() < deadline, "event loop did not drain");
    }
}

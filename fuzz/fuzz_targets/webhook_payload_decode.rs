#![no_main]

use bench_github::bench_command_parser::bench_command_from_event;
use bench_github::bench_event::TriggerEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(event) = TriggerEvent::from_payload_value(raw) {
        assert_ne!(event.installation_id, Some(0));
        if let Some(command) = bench_command_from_event(&event) {
            assert!(event.has_pull_request);
            assert_eq!(event.action, "created");
            assert_eq!(command.action, command.action.trim());
        }
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use yaml_events::{Event, Parser};

fuzz_target!(|data: &[u8]| fuzz_target(data));

fn fuzz_target(mut data: &[u8]) {
    let mut parser = Parser::new();
    parser.load(&mut data);

    let mut events = Vec::<Event>::new();
    while let Ok(true) = parser.handle_next_document(&mut events) {
        events.clear();
    }
}

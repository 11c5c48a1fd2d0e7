#![no_main]

use libfuzzer_sys::fuzz_target;
use yaml_events::Scanner;

fuzz_target!(|data: &[u8]| fuzz_target(data));

fn fuzz_target(mut data: &[u8]) {
    let scanner = Scanner::from_reader(&mut data);
    for token in scanner {
        if token.is_err() {
            break;
        }
    }
}

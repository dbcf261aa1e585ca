//! Step-by-step lookup trace for the `/gslb/trace` diagnostic endpoint
//! (spec.md §4.J, SPEC_FULL.md §12 "debug trace toggle").
//!
//! Grounded on `original_source/compute.go`'s `LookupTrace.Add`/`Addf`: an
//! append-only line buffer that the front-end/back-end resolvers write to
//! when a caller supplies one, and ignore otherwise.

use std::sync::Mutex;

#[derive(Default)]
pub struct TraceSink(Mutex<Vec<String>>);

impl TraceSink {
    pub fn new() -> Self {
        TraceSink(Mutex::new(Vec::new()))
    }

    pub fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    pub fn into_lines(self) -> Vec<String> {
        self.0.into_inner().unwrap()
    }
}

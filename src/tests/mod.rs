//! End-to-end tests that exercise the solver the way a caller would, rather than a
//! single module in isolation. Kept separate from the per-module `#[cfg(test)] mod
//! tests` blocks, the way the codebase this is adapted from keeps its own end-to-end
//! scenario coverage in a dedicated test module alongside its unit tests.

mod scenarios;

//! Integration tests - exercise the full `Analyzer::analyze` fixed-point
//! pipeline against the concrete scenarios and invariants from spec §8,
//! rather than a single rule in isolation.

mod invariant_tests;
mod scenario_tests;

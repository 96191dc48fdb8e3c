//! End-to-end tests - a single query combining several rules at once,
//! driven through the full `Analyzer::analyze` pipeline.

mod full_pipeline_tests;

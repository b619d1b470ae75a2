pub mod core;
pub mod directory;
pub mod grading;
pub mod recalc;
pub mod results;
pub mod scoring;
pub mod stats;
pub mod term_reports;

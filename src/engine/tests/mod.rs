//! End-to-end scenario tests for the badge pipeline.

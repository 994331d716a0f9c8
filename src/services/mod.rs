// src/services/mod.rs

pub mod exams;
pub mod options;
pub mod ordering;
pub mod questions;
pub mod scoring;
pub mod sequencer;
pub mod stats;
pub mod submission;

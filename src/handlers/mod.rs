// src/handlers/mod.rs

pub mod admin;
pub mod exams;
pub mod index;
pub mod stats;

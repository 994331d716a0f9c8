// src/models/mod.rs

pub mod attempt;
pub mod exam;
pub mod option;
pub mod question;

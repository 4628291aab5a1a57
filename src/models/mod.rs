// src/models/mod.rs

pub mod enrollment;
pub mod evaluation;
pub mod exam;
pub mod question_set;
pub mod session;
pub mod user;

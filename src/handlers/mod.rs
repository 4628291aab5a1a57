// src/handlers/mod.rs

pub mod auth;
pub mod evaluations;
pub mod exams;
pub mod sessions;
pub mod sets;

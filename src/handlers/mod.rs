// src/handlers/mod.rs

pub mod challenge;

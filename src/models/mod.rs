// src/models/mod.rs

pub mod challenge;

// src/handlers/mod.rs

pub mod sjt;

// src/models/mod.rs

pub mod attribute;
pub mod question;
pub mod results;
pub mod session;

// src/utils/mod.rs

pub mod hash;
pub mod invite;
pub mod jwt;

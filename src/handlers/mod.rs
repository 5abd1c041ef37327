// src/handlers/mod.rs

pub mod auth;
pub mod documents;
pub mod events;
pub mod groups;
pub mod questions;
pub mod subjects;

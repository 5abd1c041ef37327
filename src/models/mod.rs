// src/models/mod.rs

pub mod document;
pub mod event;
pub mod group;
pub mod participation;
pub mod question;
pub mod ranking;
pub mod subject;
pub mod user;

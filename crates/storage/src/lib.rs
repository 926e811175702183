#![forbid(unsafe_code)]

pub mod document;
pub mod json;
pub mod repository;
pub mod seed;
pub mod sqlite;

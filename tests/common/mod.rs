#![allow(dead_code)]

pub mod app;
pub mod auth;
pub mod fixtures;
pub mod http;
pub mod records;

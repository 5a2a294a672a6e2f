#![allow(dead_code)]

pub mod fixtures;

mod sync_flow;

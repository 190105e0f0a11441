#![allow(dead_code)]

pub mod fragment_server;

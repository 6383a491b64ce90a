// RESP2 wire layer: client connection, embedded server, frame helpers

pub mod client;
pub mod handler;
pub mod server;
pub mod utils;

pub use client::RespConnection;
pub use server::{RespConfig, RespServer};

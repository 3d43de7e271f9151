//! HTTP and WebSocket routes

pub mod detector;
pub mod windows;
pub mod ws;

//! Session and plugin behaviour against a scripted in-memory server.

mod plugin;
mod session;

//! Best-effort diagnostic snapshot of a host: identity, hardware and OS facts,
//! public IP, and an estimated location gathered from several independent
//! providers.

pub mod config;
pub mod http;
pub mod inventory;
pub mod ip;
pub mod location;
pub mod report;

//! Outbound HTTP clients

pub mod oracle;

//! Wire format types for each supported dialect

pub mod chat;
pub mod messages;
pub mod responses;

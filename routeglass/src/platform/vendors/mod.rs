//! Built-in dialect definitions.

pub mod huawei;
pub mod juniper;

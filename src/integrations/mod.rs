//! 外部接入：REST 绑定

#[cfg(feature = "rest")]
pub mod rest;

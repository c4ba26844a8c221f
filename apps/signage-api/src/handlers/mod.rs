//! Handlers 模块

pub mod assets;
pub mod health;
pub mod managed;
pub mod signage;

pub use assets::*;
pub use health::*;
pub use managed::*;
pub use signage::*;

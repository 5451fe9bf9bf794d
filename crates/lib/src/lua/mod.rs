//! Lua bricks.
//!
//! Bricks can be written as Lua chunks that return `function(ctx, params)`.
//! Each [`LuaBrick`] owns its own Lua state; the build context is lent to Lua
//! only for the duration of one invocation.
//!
//! # Submodules
//!
//! - [`brick`] - Loading Lua bricks and the `ctx` object
//! - [`convert`] - Value conversions and deferred userdata
//! - [`globals`] - The `ic` table of intrinsics and pseudo parameters
//! - [`runtime`] - Low-level Lua VM management

pub mod brick;
pub mod convert;
pub mod globals;
pub mod runtime;

pub use brick::LuaBrick;

//! Plain data types shared by descriptors, the driver boundary and the
//! backend.

mod common;
mod pass;
mod state;

pub use common::*;
pub use pass::*;
pub use state::*;

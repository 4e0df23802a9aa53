//! CLI command implementations.

mod codec;
mod info;
mod init;

pub use codec::{chunk, decode, encode};
pub use info::show_info;
pub use init::init;

//! Command implementations for espota
//!
//! Each command returns the process exit code.

pub mod check;
pub mod info;
pub mod list;
pub mod ping;
pub mod update;

pub use check::check;
pub use info::info;
pub use list::list;
pub use ping::ping;
pub use update::update;

/// Exit code for a successful command
pub const EXIT_OK: u8 = 0;
/// Exit code for a failed command
pub const EXIT_FAILURE: u8 = 1;

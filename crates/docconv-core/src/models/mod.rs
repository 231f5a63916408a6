//! Data models shared by the registry, downloader, installer and discovery.

mod progress;
mod release;
mod tool;

pub use progress::*;
pub use release::*;
pub use tool::*;

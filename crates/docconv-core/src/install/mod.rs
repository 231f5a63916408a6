//! Installation manager: archive extraction, managed layout and installs.

mod extract;
mod installer;
mod layout;

pub use extract::{extract_archive, ArchiveFormat};
pub use installer::{InstallRecord, Installer};
pub use layout::ManagedLayout;

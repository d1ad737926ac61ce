pub mod version;

pub use version::{ImageTag, VersionError, parse_major_version};

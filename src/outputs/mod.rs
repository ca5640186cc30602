//! Destination lookup: the output directory client and its cache.

mod cache;
mod directory;

pub use cache::OutputCache;
#[cfg(test)]
pub use directory::MockOutputsDirectory;
pub use directory::{HttpOutputsDirectory, OutputsDirectory, OutputsError};

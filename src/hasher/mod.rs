pub mod checksum;

pub use checksum::{identify_file, ChecksumAlgorithm, FileIdentity, BLOCK_SIZE, NO_CHECKSUM};

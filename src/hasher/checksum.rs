use crate::error::Error;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Files are read in blocks of this size so memory stays bounded no matter
/// how large a file is.
pub const BLOCK_SIZE: usize = 32 * 1024 * 1024;

/// Checksum written when hashing is skipped.
pub const NO_CHECKSUM: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Crc32,
    Md5,
    /// Size only; content identity is not available.
    None,
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha256" | "" => Ok(ChecksumAlgorithm::Sha256),
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "none" => Ok(ChecksumAlgorithm::None),
            other => Err(Error::UnsupportedChecksumAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Crc32 => "crc32",
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub size: u64,
    pub checksum: String,
}

enum Digester {
    Sha256(Sha256),
    Md5(md5::Context),
    Crc32(crc32fast::Hasher),
}

impl Digester {
    fn new(algorithm: ChecksumAlgorithm) -> Option<Digester> {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Some(Digester::Sha256(Sha256::new())),
            ChecksumAlgorithm::Md5 => Some(Digester::Md5(md5::Context::new())),
            ChecksumAlgorithm::Crc32 => Some(Digester::Crc32(crc32fast::Hasher::new())),
            ChecksumAlgorithm::None => None,
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Sha256(h) => h.update(data),
            Digester::Md5(h) => h.consume(data),
            Digester::Crc32(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Digester::Sha256(h) => hex::encode(h.finalize()),
            Digester::Md5(h) => format!("{:x}", h.compute()),
            Digester::Crc32(h) => format!("{:08x}", h.finalize()),
        }
    }
}

/// Size and lowercase hex checksum for one regular file.
pub fn identify_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<FileIdentity, Error> {
    let access_error = |reason: String| Error::FileAccess {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(path).map_err(|e| access_error(e.to_string()))?;
    if !metadata.is_file() {
        return Err(access_error("not a regular file".to_string()));
    }
    let size = metadata.len();

    let mut digester = match Digester::new(algorithm) {
        Some(d) => d,
        None => {
            return Ok(FileIdentity {
                size,
                checksum: NO_CHECKSUM.to_string(),
            })
        }
    };

    let mut file = File::open(path).map_err(|e| access_error(e.to_string()))?;
    let mut buffer = vec![0u8; BLOCK_SIZE.min(size.max(1) as usize)];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| access_error(e.to_string()))?;
        if read == 0 {
            break;
        }
        digester.update(&buffer[..read]);
    }

    Ok(FileIdentity {
        size,
        checksum: digester.finish(),
    })
}

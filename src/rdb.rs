use std::io;

use base64::{engine::general_purpose, Engine as _};

use crate::resp::RespValue;

// Snapshot of an empty dataset, sent verbatim on every full resync.
const EMPTY_RDB: &str = "UkVESVMwMDEx+glyZWRpcy12ZXIFNy4yLjD6CnJlZGlzLWJpdHPAQPoFY3RpbWXCbQi8ZfoIdXNlZC1tZW3CsMQQAPoIYW9mLWJhc2XAAP/wbjv+wP9aog==";

pub fn empty_rdb() -> io::Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(EMPTY_RDB)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// The snapshot block that follows `+FULLRESYNC`, ready to be written.
pub fn rdb_file_block() -> io::Result<Vec<u8>> {
    Ok(RespValue::encode_snapshot(&empty_rdb()?))
}

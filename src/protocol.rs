//! FastDFS Protocol Encoding and Decoding
//!
//! Header framing, file ID parsing and fixed-width field padding shared by
//! every task.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::path::Path;

use crate::errors::{map_status_to_error, FdfsError, Result};
use crate::types::*;

/// Encodes a FastDFS protocol header into a 10-byte buffer
///
/// The header format is:
///   - Bytes 0-7: Body length (8 bytes, big-endian uint64)
///   - Byte 8: Command code
///   - Byte 9: Status code (0 for request, error code for response)
pub fn encode_header(length: u64, cmd: u8, status: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(FDFS_PROTO_HEADER_LEN);
    buf.put_u64(length);
    buf.put_u8(cmd);
    buf.put_u8(status);
    buf.freeze()
}

/// Decodes a FastDFS protocol header from a buffer
///
/// The header must be at least 10 bytes long; extra bytes are ignored.
pub fn decode_header(data: &[u8]) -> Result<Header> {
    if data.len() < FDFS_PROTO_HEADER_LEN {
        return Err(FdfsError::InvalidResponse(format!(
            "Header too short: {} bytes",
            data.len()
        )));
    }

    let mut buf = &data[..FDFS_PROTO_HEADER_LEN];
    let length = buf.get_u64();
    let cmd = buf.get_u8();
    let status = buf.get_u8();

    Ok(Header { length, cmd, status })
}

/// Rejects a response header that is not a successful reply
///
/// The command byte must be [`FDFS_PROTO_CMD_RESP`] and the status zero.
pub fn check_response_header(header: &Header) -> Result<()> {
    if header.cmd != FDFS_PROTO_CMD_RESP {
        return Err(FdfsError::InvalidResponse(format!(
            "Unexpected response command {}",
            header.cmd
        )));
    }
    match map_status_to_error(header.status) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Splits a FastDFS file ID into its components
///
/// A file ID has the format: "groupName/path/to/file"
/// For example: "group1/M00/00/00/wKgBcFxyz.jpg"
pub fn split_file_id(file_id: &str) -> Result<(String, String)> {
    let Some((group_name, remote_filename)) = file_id.split_once(FILE_ID_SEPARATOR) else {
        return Err(FdfsError::InvalidFileId(file_id.to_string()));
    };

    if group_name.is_empty() || group_name.len() > FDFS_GROUP_NAME_MAX_LEN {
        return Err(FdfsError::InvalidFileId(file_id.to_string()));
    }

    if remote_filename.is_empty() {
        return Err(FdfsError::InvalidFileId(file_id.to_string()));
    }

    Ok((group_name.to_string(), remote_filename.to_string()))
}

/// Constructs a complete file ID from its components
///
/// This is the inverse operation of split_file_id.
pub fn join_file_id(group_name: &str, remote_filename: &str) -> String {
    format!("{}{}{}", group_name, FILE_ID_SEPARATOR, remote_filename)
}

/// Extracts the file extension from a filename
///
/// The extension is extracted without the leading dot and truncated to 6 bytes
/// if it exceeds the FastDFS maximum.
///
/// Examples:
///   - "test.jpg" -> "jpg"
///   - "file.tar.gz" -> "gz"
///   - "noext" -> ""
///   - "file.verylongext" -> "verylo" (truncated)
pub fn get_file_ext_name(filename: impl AsRef<Path>) -> String {
    let ext = filename
        .as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let mut end = ext.len().min(FDFS_FILE_EXT_NAME_MAX_LEN);
    while !ext.is_char_boundary(end) {
        end -= 1;
    }
    ext[..end].to_string()
}

/// Writes a string into a fixed-width field padded with null bytes (0x00)
///
/// If the string is longer than length, it is truncated.
pub fn put_padded(buf: &mut BytesMut, s: &str, length: usize) {
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(length);
    buf.put_slice(&bytes[..copy_len]);
    buf.put_bytes(0, length - copy_len);
}

/// Pads a string to a fixed length with null bytes (0x00)
pub fn pad_string(s: &str, length: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(length);
    put_padded(&mut buf, s, length);
    buf.freeze()
}

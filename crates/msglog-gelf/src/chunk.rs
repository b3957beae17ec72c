//! GELF UDP chunking

use std::io;

/// Magic bytes opening every chunk
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

/// Magic, message id, sequence number and sequence count
pub const CHUNK_HEADER_LEN: usize = 12;

/// Collectors discard messages split into more chunks than this
pub const MAX_CHUNKS: usize = 128;

/// Datagram size safe for most WAN paths
pub const DEFAULT_CHUNK_SIZE: usize = 1420;

/// Split `payload` into datagrams of at most `chunk_size` bytes.
///
/// Payloads that fit are sent as-is. Larger payloads get a chunk header on
/// every datagram, all sharing `message_id`.
pub fn split(payload: &[u8], chunk_size: usize, message_id: [u8; 8]) -> io::Result<Vec<Vec<u8>>> {
    if payload.len() <= chunk_size {
        return Ok(vec![payload.to_vec()]);
    }

    if chunk_size <= CHUNK_HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("chunk size {} leaves no room for data", chunk_size),
        ));
    }

    let data_len = chunk_size - CHUNK_HEADER_LEN;
    let count = payload.len().div_ceil(data_len);
    if count > MAX_CHUNKS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes needs {} chunks, limit is {}", payload.len(), count, MAX_CHUNKS),
        ));
    }

    Ok(payload
        .chunks(data_len)
        .enumerate()
        .map(|(seq, data)| {
            let mut datagram = Vec::with_capacity(CHUNK_HEADER_LEN + data.len());
            datagram.extend_from_slice(&CHUNK_MAGIC);
            datagram.extend_from_slice(&message_id);
            datagram.push(seq as u8);
            datagram.push(count as u8);
            datagram.extend_from_slice(data);
            datagram
        })
        .collect())
}

//! Binary snapshot envelope: `magic(4) + version(u16) + flags(u8) +
//! checksum_len(u8) + payload_len(u32) + checksum + payload`, validated in
//! strict order so a caller gets the most specific rejection reason
//! possible. Bit 0 of `flags` selects gzip framing of the payload.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use hashmap_core::error::Error;

/// 4-byte magic identifying this file format.
pub const MAGIC: [u8; 4] = *b"AHSH";
/// Current format version.
pub const FORMAT_VERSION: u16 = 1;
/// Flag bit selecting gzip-compressed payload framing.
pub const FLAG_GZIP: u8 = 0b0000_0001;
/// Highest flag bit combination this version understands.
const KNOWN_FLAGS_MASK: u8 = FLAG_GZIP;
/// CRC32 checksums are always 4 bytes.
const CHECKSUM_LEN: u8 = 4;
/// Refuse to even attempt decoding payloads larger than this, to bound
/// memory use on a corrupt or hostile length field.
const MAX_PAYLOAD_BYTES: u32 = 1 << 30;

/// Parsed and validated snapshot header.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    /// Format version; only [`FORMAT_VERSION`] is currently accepted.
    pub version: u16,
    /// Bitflags; only [`FLAG_GZIP`] is currently defined.
    pub flags: u8,
    /// Length in bytes of the checksum field. Always [`CHECKSUM_LEN`].
    pub checksum_len: u8,
    /// Length in bytes of the (possibly compressed) payload that follows.
    pub payload_len: u32,
}

impl SnapshotHeader {
    fn is_gzip(&self) -> bool {
        self.flags & FLAG_GZIP != 0
    }
}

/// Serialize `payload` (already-encoded bytes, typically JSON) into the
/// framed snapshot format.
pub fn encode(payload: &[u8], compress: bool) -> Result<Vec<u8>, Error> {
    let body = if compress {
        gzip_compress(payload)?
    } else {
        payload.to_vec()
    };
    if body.len() as u64 > MAX_PAYLOAD_BYTES as u64 {
        return Err(Error::bad_input(
            "payload",
            "exceeds maximum snapshot payload size",
        ));
    }

    let checksum = crc32fast::hash(&body);
    let flags = if compress { FLAG_GZIP } else { 0 };

    let mut out = Vec::with_capacity(4 + 2 + 1 + 1 + 4 + 4 + body.len());
    out.extend_from_slice(&MAGIC);
    out.write_u16::<BigEndian>(FORMAT_VERSION).unwrap();
    out.write_u8(flags).unwrap();
    out.write_u8(CHECKSUM_LEN).unwrap();
    out.write_u32::<BigEndian>(body.len() as u32).unwrap();
    out.write_u32::<BigEndian>(checksum).unwrap();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse and validate a framed snapshot, returning the decoded (and, if
/// flagged, decompressed) payload bytes.
///
/// Validation proceeds strictly in header order — magic, then version,
/// then flags, then checksum, then payload size — so the first thing
/// wrong with a corrupt file is also the first thing reported.
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| Error::io("<snapshot>", "magic: snapshot is shorter than the header"))?;
    if magic != MAGIC {
        return Err(Error::io("<snapshot>", "magic: does not match the expected snapshot magic"));
    }

    let version = cursor
        .read_u16::<BigEndian>()
        .map_err(|_| Error::io("<snapshot>", "version: truncated before version field"))?;
    if version != FORMAT_VERSION {
        return Err(Error::io("<snapshot>", "version: unsupported snapshot format version"));
    }

    let flags = cursor
        .read_u8()
        .map_err(|_| Error::io("<snapshot>", "flags: truncated before flags field"))?;
    if flags & !KNOWN_FLAGS_MASK != 0 {
        return Err(Error::io("<snapshot>", "flags: unsupported snapshot flags set"));
    }

    let checksum_len = cursor
        .read_u8()
        .map_err(|_| Error::io("<snapshot>", "checksum_len: truncated before checksum_len field"))?;
    if checksum_len != CHECKSUM_LEN {
        return Err(Error::io("<snapshot>", "checksum_len: unsupported checksum length"));
    }

    let payload_len = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| Error::io("<snapshot>", "payload_len: truncated before payload_len field"))?;
    if payload_len > MAX_PAYLOAD_BYTES {
        return Err(Error::io("<snapshot>", "payload_len: payload exceeds maximum snapshot size"));
    }

    let expected_checksum = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| Error::io("<snapshot>", "checksum: truncated before checksum field"))?;

    let header = SnapshotHeader {
        version,
        flags,
        checksum_len,
        payload_len,
    };

    let mut body = vec![0u8; payload_len as usize];
    cursor
        .read_exact(&mut body)
        .map_err(|_| Error::io("<snapshot>", "payload: fewer bytes present than payload_len declares"))?;

    let actual_checksum = crc32fast::hash(&body);
    if actual_checksum != expected_checksum {
        return Err(Error::io("<snapshot>", "checksum: checksum mismatch, snapshot is corrupt"));
    }

    if header.is_gzip() {
        gzip_decompress(&body)
    } else {
        Ok(body)
    }
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::io("<snapshot payload>", e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::io("<snapshot payload>", e.to_string()))
}

fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    use flate2::read::GzDecoder;
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| Error::io("<snapshot payload>", "payload: corrupt gzip payload"))?;
    Ok(out)
}

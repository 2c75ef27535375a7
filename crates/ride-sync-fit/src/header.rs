use crate::mutate::FitError;

/// Offset of the `.FIT` magic within the file header.
pub const MAGIC_OFFSET: usize = 8;
pub const MAGIC: &[u8; 4] = b".FIT";

/// Parsed FIT file header (12 or 14 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitHeader {
    pub size: usize,
    pub protocol_version: u8,
    pub profile_version: u16,
    /// Byte length of the record stream following the header.
    pub data_size: usize,
    /// Header checksum; only present in 14-byte headers, and zero means
    /// the writer chose not to fill it in.
    pub crc: Option<u16>,
}

impl FitHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, FitError> {
        if bytes.len() < 12 {
            return Err(FitError::Truncated("file shorter than a FIT header".into()));
        }

        let size = bytes[0] as usize;
        if size != 12 && size != 14 {
            return Err(FitError::BadMagic);
        }
        if !has_fit_magic(bytes) {
            return Err(FitError::BadMagic);
        }
        if bytes.len() < size {
            return Err(FitError::Truncated("header extends past end of file".into()));
        }

        let crc = if size == 14 {
            Some(u16::from_le_bytes([bytes[12], bytes[13]]))
        } else {
            None
        };

        Ok(Self {
            size,
            protocol_version: bytes[1],
            profile_version: u16::from_le_bytes([bytes[2], bytes[3]]),
            data_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize,
            crc,
        })
    }
}

/// True when the buffer starts with a FIT header magic. Used by download
/// code to sanity-check bytes before treating them as an activity file.
pub fn has_fit_magic(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC_OFFSET + MAGIC.len() && &bytes[MAGIC_OFFSET..MAGIC_OFFSET + 4] == MAGIC
}

use crate::crc;
use crate::header::FitHeader;
use crate::identity::DeviceIdentity;

/// Global message numbers carrying device identity fields.
const GLOBAL_FILE_ID: u16 = 0;
const GLOBAL_DEVICE_INFO: u16 = 23;

/// Ways a byte buffer can fail to be a FIT container we can rewrite.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("missing .FIT magic in header")]
    BadMagic,

    #[error("truncated file: {0}")]
    Truncated(String),

    #[error("data message references undefined local type {0}")]
    UndefinedLocalType(u8),

    #[error("unsupported architecture byte {0} in definition message")]
    UnsupportedArchitecture(u8),

    #[error("no file_id message in file")]
    MissingIdentity,
}

/// Rewrite the device identity fields of a FIT activity file.
///
/// Walks the record stream, patching `file_id` and `device_info` data
/// messages in place and passing every other record through byte-for-byte,
/// then recomputes the header and trailing checksums. The input must carry
/// at least one `file_id` message or the result would not identify as a
/// recording at all.
pub fn mutate(original: &[u8], identity: &DeviceIdentity) -> Result<Vec<u8>, FitError> {
    let header = FitHeader::parse(original)?;
    let data_end = header.size + header.data_size;

    if original.len() < data_end {
        return Err(FitError::Truncated(
            "record stream extends past end of file".into(),
        ));
    }

    // Trailing CRC (if present) is dropped here and re-appended after the
    // rewrite.
    let mut out = original[..data_end].to_vec();

    let mut definitions: Vec<Option<MessageDefinition>> = (0..16).map(|_| None).collect();
    let mut identity_seen = false;
    let mut offset = header.size;

    while offset < data_end {
        let record_header = out[offset];

        if record_header & 0x80 == 0 && record_header & 0x40 != 0 {
            // Definition message: bit 5 flags trailing developer field
            // definitions.
            let local = (record_header & 0x0F) as usize;
            let has_developer_fields = record_header & 0x20 != 0;
            let def =
                MessageDefinition::parse(&out[offset + 1..data_end], has_developer_fields)?;

            offset += 1 + def.wire_size;
            definitions[local] = Some(def);
        } else {
            // Data message, either a normal header (local in bits 0-3) or a
            // compressed timestamp header (bit 7 set, local in bits 5-6).
            let local = if record_header & 0x80 != 0 {
                ((record_header >> 5) & 0x03) as usize
            } else {
                (record_header & 0x0F) as usize
            };

            let def = definitions[local]
                .as_ref()
                .ok_or(FitError::UndefinedLocalType(local as u8))?;

            let start = offset + 1;
            let end = start + def.data_size;
            if end > data_end {
                return Err(FitError::Truncated(format!(
                    "data message for local type {local} runs past end of stream"
                )));
            }

            match def.global_number {
                GLOBAL_FILE_ID => {
                    patch_identity(&mut out[start..end], def, identity);
                    identity_seen = true;
                }
                GLOBAL_DEVICE_INFO => patch_identity(&mut out[start..end], def, identity),
                _ => {}
            }

            offset = end;
        }
    }

    if !identity_seen {
        return Err(FitError::MissingIdentity);
    }

    // A zero header CRC means the original writer left it unset; keep it so.
    if header.crc.is_some_and(|existing| existing != 0) {
        let header_crc = crc::checksum(&out[..12]);
        out[12..14].copy_from_slice(&header_crc.to_le_bytes());
    }

    let file_crc = crc::checksum(&out);
    out.extend_from_slice(&file_crc.to_le_bytes());

    Ok(out)
}

/// A parsed definition message: enough layout information to size and
/// address the data messages that reference it.
#[derive(Debug, Clone)]
struct MessageDefinition {
    big_endian: bool,
    global_number: u16,
    fields: Vec<FieldDefinition>,
    /// Payload size of one data message, developer fields included.
    data_size: usize,
    /// Bytes this definition occupied on the wire, record header excluded.
    wire_size: usize,
}

#[derive(Debug, Clone, Copy)]
struct FieldDefinition {
    number: u8,
    size: usize,
}

impl MessageDefinition {
    fn parse(bytes: &[u8], has_developer_fields: bool) -> Result<Self, FitError> {
        if bytes.len() < 5 {
            return Err(FitError::Truncated("definition message header".into()));
        }

        let architecture = bytes[1];
        let big_endian = match architecture {
            0 => false,
            1 => true,
            other => return Err(FitError::UnsupportedArchitecture(other)),
        };

        let global_number = if big_endian {
            u16::from_be_bytes([bytes[2], bytes[3]])
        } else {
            u16::from_le_bytes([bytes[2], bytes[3]])
        };

        let field_count = bytes[4] as usize;
        let mut cursor = 5;

        if bytes.len() < cursor + field_count * 3 {
            return Err(FitError::Truncated("definition field list".into()));
        }

        let mut fields = Vec::with_capacity(field_count);
        let mut data_size = 0;
        for _ in 0..field_count {
            let number = bytes[cursor];
            let size = bytes[cursor + 1] as usize;
            // bytes[cursor + 2] is the base type; layout only needs the size.
            fields.push(FieldDefinition { number, size });
            data_size += size;
            cursor += 3;
        }

        if has_developer_fields {
            if bytes.len() < cursor + 1 {
                return Err(FitError::Truncated("developer field count".into()));
            }
            let dev_count = bytes[cursor] as usize;
            cursor += 1;

            if bytes.len() < cursor + dev_count * 3 {
                return Err(FitError::Truncated("developer field list".into()));
            }
            for _ in 0..dev_count {
                data_size += bytes[cursor + 1] as usize;
                cursor += 3;
            }
        }

        Ok(Self {
            big_endian,
            global_number,
            fields,
            data_size,
            wire_size: cursor,
        })
    }
}

enum FieldValue {
    U16(u16),
    U32(u32),
}

/// Overwrite the identity fields present in one data message payload.
/// Fields whose declared size disagrees with the profile are left alone.
fn patch_identity(payload: &mut [u8], def: &MessageDefinition, identity: &DeviceIdentity) {
    let mut offset = 0;

    for field in &def.fields {
        let value = match (def.global_number, field.number) {
            (GLOBAL_FILE_ID, 1) => Some(FieldValue::U16(identity.manufacturer_id)),
            (GLOBAL_FILE_ID, 2) => Some(FieldValue::U16(identity.product_id)),
            (GLOBAL_FILE_ID, 3) => Some(FieldValue::U32(identity.serial_number)),
            (GLOBAL_DEVICE_INFO, 2) => Some(FieldValue::U16(identity.manufacturer_id)),
            (GLOBAL_DEVICE_INFO, 3) => Some(FieldValue::U32(identity.serial_number)),
            (GLOBAL_DEVICE_INFO, 4) => Some(FieldValue::U16(identity.product_id)),
            (GLOBAL_DEVICE_INFO, 5) => {
                Some(FieldValue::U16(identity.software_version_scaled()))
            }
            _ => None,
        };

        match value {
            Some(FieldValue::U16(v)) if field.size == 2 => {
                let bytes = if def.big_endian {
                    v.to_be_bytes()
                } else {
                    v.to_le_bytes()
                };
                payload[offset..offset + 2].copy_from_slice(&bytes);
            }
            Some(FieldValue::U32(v)) if field.size == 4 => {
                let bytes = if def.big_endian {
                    v.to_be_bytes()
                } else {
                    v.to_le_bytes()
                };
                payload[offset..offset + 4].copy_from_slice(&bytes);
            }
            _ => {}
        }

        offset += field.size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        BASE_TYPE_ENUM, BASE_TYPE_UINT16, BASE_TYPE_UINT32, BASE_TYPE_UINT32Z, FitFileBuilder,
        sample_activity,
    };

    fn identity_a() -> DeviceIdentity {
        DeviceIdentity {
            manufacturer_id: 1,
            product_id: 4024,
            serial_number: 0xDEAD_BEEF,
            software_version: 20.19,
        }
    }

    fn identity_b() -> DeviceIdentity {
        DeviceIdentity {
            manufacturer_id: 32,
            product_id: 7,
            serial_number: 42,
            software_version: 1.5,
        }
    }

    /// Offsets of the file_id data payload in `sample_activity()`:
    /// header (14) + file_id definition (6 + 4*3 = 18) + record header (1).
    const FILE_ID_PAYLOAD: usize = 14 + 18 + 1;

    #[test]
    fn rewrites_file_id_fields() {
        let mutated = mutate(&sample_activity(), &identity_a()).unwrap();

        let payload = &mutated[FILE_ID_PAYLOAD..];
        assert_eq!(payload[0], 4); // type untouched
        assert_eq!(u16::from_le_bytes([payload[1], payload[2]]), 1);
        assert_eq!(u16::from_le_bytes([payload[3], payload[4]]), 4024);
        assert_eq!(
            u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]]),
            0xDEAD_BEEF
        );
    }

    #[test]
    fn rewrites_device_info_including_software_version() {
        let mutated = mutate(&sample_activity(), &identity_a()).unwrap();

        // file_id definition + data, then device_info definition (6 + 5*3)
        // and its record header.
        let payload_start = FILE_ID_PAYLOAD + 9 + 21 + 1;
        let payload = &mutated[payload_start..];
        assert_eq!(u16::from_le_bytes([payload[4], payload[5]]), 1);
        assert_eq!(
            u32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]),
            0xDEAD_BEEF
        );
        assert_eq!(u16::from_le_bytes([payload[10], payload[11]]), 4024);
        assert_eq!(u16::from_le_bytes([payload[12], payload[13]]), 2019);
    }

    #[test]
    fn round_trip_settles_on_second_identity() {
        let original = sample_activity();
        let once = mutate(&original, &identity_a()).unwrap();
        let twice = mutate(&once, &identity_b()).unwrap();

        let payload = &twice[FILE_ID_PAYLOAD..];
        assert_eq!(u16::from_le_bytes([payload[1], payload[2]]), 32);
        assert_eq!(u16::from_le_bytes([payload[3], payload[4]]), 7);
        assert_eq!(
            u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]]),
            42
        );

        // Non-identity records (the sensor record at the tail of the data
        // section) must be byte-identical to the original input.
        let record_len = 1 + 6; // header + timestamp + power
        let header = FitHeader::parse(&original).unwrap();
        let data_end = header.size + header.data_size;
        assert_eq!(
            &twice[data_end - record_len..data_end],
            &original[data_end - record_len..data_end]
        );
    }

    #[test]
    fn trailing_checksum_verifies() {
        let mutated = mutate(&sample_activity(), &identity_a()).unwrap();
        // A correct trailing CRC folds the framed stream to zero.
        assert_eq!(crc::checksum(&mutated), 0);
    }

    #[test]
    fn header_checksum_recomputed() {
        let mutated = mutate(&sample_activity(), &identity_a()).unwrap();
        let stored = u16::from_le_bytes([mutated[12], mutated[13]]);
        assert_eq!(stored, crc::checksum(&mutated[..12]));
    }

    #[test]
    fn zero_header_checksum_left_alone() {
        let file = FitFileBuilder::new()
            .zero_header_crc()
            .definition(0, 0, &[(1, 2, BASE_TYPE_UINT16)])
            .data(0, &255u16.to_le_bytes())
            .build();

        let mutated = mutate(&file, &identity_a()).unwrap();
        assert_eq!(u16::from_le_bytes([mutated[12], mutated[13]]), 0);
    }

    #[test]
    fn supports_legacy_twelve_byte_header() {
        let file = FitFileBuilder::new()
            .legacy_header()
            .definition(0, 0, &[(1, 2, BASE_TYPE_UINT16)])
            .data(0, &255u16.to_le_bytes())
            .build();

        let mutated = mutate(&file, &identity_a()).unwrap();
        let start = 12 + 9 + 1; // header + definition + record header
        assert_eq!(u16::from_le_bytes([mutated[start], mutated[start + 1]]), 1);
        assert_eq!(crc::checksum(&mutated), 0);
    }

    #[test]
    fn honors_big_endian_definitions() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&255u16.to_be_bytes());
        payload.extend_from_slice(&9u32.to_be_bytes());

        let file = FitFileBuilder::new()
            .definition_big_endian(0, 0, &[(1, 2, BASE_TYPE_UINT16), (3, 4, BASE_TYPE_UINT32Z)])
            .data(0, &payload)
            .build();

        let mutated = mutate(&file, &identity_a()).unwrap();
        let start = 14 + 12 + 1; // header + definition + record header
        assert_eq!(u16::from_be_bytes([mutated[start], mutated[start + 1]]), 1);
        assert_eq!(
            u32::from_be_bytes([
                mutated[start + 2],
                mutated[start + 3],
                mutated[start + 4],
                mutated[start + 5]
            ]),
            0xDEAD_BEEF
        );
    }

    #[test]
    fn walks_compressed_timestamp_messages() {
        let file = FitFileBuilder::new()
            .definition(0, 0, &[(1, 2, BASE_TYPE_UINT16)])
            .data(0, &255u16.to_le_bytes())
            .definition(1, 20, &[(7, 2, BASE_TYPE_UINT16)])
            .compressed_data(1, 12, &200u16.to_le_bytes())
            .build();

        assert!(mutate(&file, &identity_a()).is_ok());
    }

    #[test]
    fn skips_developer_fields_without_losing_alignment() {
        let file = FitFileBuilder::new()
            .definition(0, 0, &[(1, 2, BASE_TYPE_UINT16)])
            .data(0, &255u16.to_le_bytes())
            .definition_with_developer_fields(
                1,
                20,
                &[(7, 2, BASE_TYPE_UINT16)],
                &[(0, 4, 0)],
            )
            .data(1, &[0xC8, 0x00, 0x01, 0x02, 0x03, 0x04])
            .build();

        let mutated = mutate(&file, &identity_a()).unwrap();
        assert_eq!(crc::checksum(&mutated), 0);
    }

    #[test]
    fn unexpected_field_size_left_untouched() {
        // manufacturer declared as a single byte; not the profile layout,
        // so the mutator must not write into it.
        let file = FitFileBuilder::new()
            .definition(0, 0, &[(1, 1, BASE_TYPE_ENUM), (3, 4, BASE_TYPE_UINT32)])
            .data(0, &[0x7F, 1, 2, 3, 4])
            .build();

        let mutated = mutate(&file, &identity_a()).unwrap();
        assert_eq!(mutated[14 + 12 + 1], 0x7F);
    }

    #[test]
    fn missing_file_id_is_malformed() {
        let file = FitFileBuilder::new()
            .definition(0, 20, &[(7, 2, BASE_TYPE_UINT16)])
            .data(0, &200u16.to_le_bytes())
            .build();

        assert!(matches!(
            mutate(&file, &identity_a()),
            Err(FitError::MissingIdentity)
        ));
    }

    #[test]
    fn bad_magic_is_malformed() {
        let mut file = sample_activity();
        file[8] = b'X';
        assert!(matches!(
            mutate(&file, &identity_a()),
            Err(FitError::BadMagic)
        ));
    }

    #[test]
    fn data_before_definition_is_malformed() {
        let file = FitFileBuilder::new().data(3, &[0, 0]).build();
        assert!(matches!(
            mutate(&file, &identity_a()),
            Err(FitError::UndefinedLocalType(3))
        ));
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let full = sample_activity();
        // Chop mid-record but lie about nothing: the header's data_size now
        // points past the end of the buffer.
        let truncated = &full[..full.len() - 10];
        assert!(matches!(
            mutate(truncated, &identity_a()),
            Err(FitError::Truncated(_))
        ));
    }

    #[test]
    fn never_returns_input_unmodified_on_error() {
        let garbage = vec![0u8; 64];
        assert!(mutate(&garbage, &identity_a()).is_err());
    }
}

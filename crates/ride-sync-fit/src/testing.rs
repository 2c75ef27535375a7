//! Builders for synthetic FIT files used in tests.

use crate::crc;

pub const BASE_TYPE_ENUM: u8 = 0x00;
pub const BASE_TYPE_UINT8: u8 = 0x02;
pub const BASE_TYPE_UINT16: u8 = 0x84;
pub const BASE_TYPE_UINT32: u8 = 0x86;
pub const BASE_TYPE_UINT32Z: u8 = 0x8C;

/// Assembles a record stream and frames it with a FIT header and checksums.
pub struct FitFileBuilder {
    records: Vec<u8>,
    header_size: u8,
    fill_header_crc: bool,
}

impl FitFileBuilder {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            header_size: 14,
            fill_header_crc: true,
        }
    }

    /// Use the legacy 12-byte header without a header checksum.
    pub fn legacy_header(mut self) -> Self {
        self.header_size = 12;
        self
    }

    /// Keep the 14-byte header but leave its checksum zeroed.
    pub fn zero_header_crc(mut self) -> Self {
        self.fill_header_crc = false;
        self
    }

    /// Append a little-endian definition message.
    /// Fields are `(field_number, size, base_type)` triples.
    pub fn definition(self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> Self {
        self.definition_with_arch(local, global, fields, false)
    }

    /// Append a big-endian definition message.
    pub fn definition_big_endian(self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> Self {
        self.definition_with_arch(local, global, fields, true)
    }

    fn definition_with_arch(
        mut self,
        local: u8,
        global: u16,
        fields: &[(u8, u8, u8)],
        big_endian: bool,
    ) -> Self {
        self.records.push(0x40 | (local & 0x0F));
        self.records.push(0); // reserved
        self.records.push(if big_endian { 1 } else { 0 });
        let global_bytes = if big_endian {
            global.to_be_bytes()
        } else {
            global.to_le_bytes()
        };
        self.records.extend_from_slice(&global_bytes);
        self.records.push(fields.len() as u8);
        for &(number, size, base_type) in fields {
            self.records.extend_from_slice(&[number, size, base_type]);
        }
        self
    }

    /// Append a definition message that also declares developer fields.
    pub fn definition_with_developer_fields(
        mut self,
        local: u8,
        global: u16,
        fields: &[(u8, u8, u8)],
        developer_fields: &[(u8, u8, u8)],
    ) -> Self {
        self.records.push(0x60 | (local & 0x0F));
        self.records.push(0);
        self.records.push(0);
        self.records.extend_from_slice(&global.to_le_bytes());
        self.records.push(fields.len() as u8);
        for &(number, size, base_type) in fields {
            self.records.extend_from_slice(&[number, size, base_type]);
        }
        self.records.push(developer_fields.len() as u8);
        for &(number, size, dev_index) in developer_fields {
            self.records.extend_from_slice(&[number, size, dev_index]);
        }
        self
    }

    /// Append a data message with a normal record header.
    pub fn data(mut self, local: u8, payload: &[u8]) -> Self {
        self.records.push(local & 0x0F);
        self.records.extend_from_slice(payload);
        self
    }

    /// Append a data message with a compressed timestamp header.
    pub fn compressed_data(mut self, local: u8, time_offset: u8, payload: &[u8]) -> Self {
        self.records
            .push(0x80 | ((local & 0x03) << 5) | (time_offset & 0x1F));
        self.records.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut bytes = vec![self.header_size, 0x10, 0x2C, 0x08];
        bytes.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        if self.header_size == 14 {
            let header_crc = if self.fill_header_crc {
                crc::checksum(&bytes)
            } else {
                0
            };
            bytes.extend_from_slice(&header_crc.to_le_bytes());
        }
        bytes.extend_from_slice(&self.records);
        let file_crc = crc::checksum(&bytes);
        bytes.extend_from_slice(&file_crc.to_le_bytes());
        bytes
    }
}

impl Default for FitFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A small but complete activity file: `file_id`, `device_info`, and one
/// sensor record, all little-endian.
pub fn sample_activity() -> Vec<u8> {
    let mut file_id_payload = vec![4u8]; // type = activity
    file_id_payload.extend_from_slice(&255u16.to_le_bytes()); // manufacturer
    file_id_payload.extend_from_slice(&1u16.to_le_bytes()); // product
    file_id_payload.extend_from_slice(&0x0102_0304u32.to_le_bytes()); // serial

    let mut device_info_payload = Vec::new();
    device_info_payload.extend_from_slice(&1000u32.to_le_bytes()); // timestamp
    device_info_payload.extend_from_slice(&255u16.to_le_bytes()); // manufacturer
    device_info_payload.extend_from_slice(&0x0102_0304u32.to_le_bytes()); // serial
    device_info_payload.extend_from_slice(&1u16.to_le_bytes()); // product
    device_info_payload.extend_from_slice(&100u16.to_le_bytes()); // software version

    let mut record_payload = Vec::new();
    record_payload.extend_from_slice(&1000u32.to_le_bytes()); // timestamp
    record_payload.extend_from_slice(&250u16.to_le_bytes()); // power

    FitFileBuilder::new()
        .definition(
            0,
            0,
            &[
                (0, 1, BASE_TYPE_ENUM),
                (1, 2, BASE_TYPE_UINT16),
                (2, 2, BASE_TYPE_UINT16),
                (3, 4, BASE_TYPE_UINT32Z),
            ],
        )
        .data(0, &file_id_payload)
        .definition(
            1,
            23,
            &[
                (253, 4, BASE_TYPE_UINT32),
                (2, 2, BASE_TYPE_UINT16),
                (3, 4, BASE_TYPE_UINT32Z),
                (4, 2, BASE_TYPE_UINT16),
                (5, 2, BASE_TYPE_UINT16),
            ],
        )
        .data(1, &device_info_payload)
        .definition(2, 20, &[(253, 4, BASE_TYPE_UINT32), (7, 2, BASE_TYPE_UINT16)])
        .data(2, &record_payload)
        .build()
}

//! Table-driven CRCs used by the frame format.
//!
//! Both are reflected (LSB-first) CRCs with non-zero seeds:
//!
//! ```text
//! crc8   poly 0x31 (reflected 0x8C)    seed 0x77    header bytes 0..3
//! crc16  poly 0x1021 (reflected 0x8408) seed 0x3692 every byte before the trailer
//! ```

const CRC8_POLY: u8 = 0x8c;
const CRC8_SEED: u8 = 0x77;
const CRC16_POLY: u16 = 0x8408;
const CRC16_SEED: u16 = 0x3692;

static CRC8_TABLE: [u8; 256] = crc8_table();
static CRC16_TABLE: [u16; 256] = crc16_table();

const fn crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ CRC8_POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ CRC16_POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 8-bit header checksum.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(CRC8_SEED, |crc, &b| CRC8_TABLE[(crc ^ b) as usize])
}

/// 16-bit frame checksum.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CRC16_SEED, |crc, &b| {
        CRC16_TABLE[((crc ^ b as u16) & 0xff) as usize] ^ (crc >> 8)
    })
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_heads() {
        assert_eq!(&CRC8_TABLE[..4], &[0x00, 0x5e, 0xbc, 0xe2]);
        assert_eq!(&CRC16_TABLE[..4], &[0x0000, 0x1189, 0x2312, 0x329b]);
    }

    #[test]
    fn takeoff_header_crc() {
        assert_eq!(crc8(&[0xcc, 0x58, 0x00]), 0x7c);
    }

    #[test]
    fn check_strings() {
        assert_eq!(crc8(b"123456789"), 0xfb);
        assert_eq!(crc16(b"123456789"), 0x7109);
    }

    #[test]
    fn empty_input_is_seed() {
        assert_eq!(crc8(&[]), CRC8_SEED);
        assert_eq!(crc16(&[]), CRC16_SEED);
    }
}

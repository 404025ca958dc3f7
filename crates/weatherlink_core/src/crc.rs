//! CRC-16 usado em todos os registros do console.
//!
//! Variante CCITT (polinômio `0x1021`) com valor inicial 0 e tabela de 256
//! entradas calculada em tempo de compilação.
//!
//! ```text
//! crc = TABLE[((crc >> 8) ^ byte) & 0xFF] ^ ((crc << 8) & 0xFF00)
//! ```
//!
//! Um buffer que já carrega seu próprio trailer (2 bytes, **big-endian**) é
//! válido se e somente se `checksum(buffer) == 0`.

/// Polinômio gerador CCITT.
const POLYNOMIAL: u16 = 0x1021;

/// Tabela pré-computada.
pub const CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Acumulador incremental, útil quando o frame chega em pedaços.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Acumula uma fatia de bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        self.value = bytes.iter().fold(self.value, |crc, b| crc_byte(crc, *b));
    }

    pub const fn value(&self) -> u16 {
        self.value
    }
}

fn crc_byte(crc: u16, b: u8) -> u16 {
    CRC_TABLE[(((crc >> 8) ^ b as u16) & 0xFF) as usize] ^ ((crc << 8) & 0xFF00)
}

/// Calcula o CRC de um buffer completo.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(bytes);
    crc.value()
}

/// `true` se o buffer (payload + trailer big-endian) resolve para zero.
pub fn is_valid(frame: &[u8]) -> bool {
    checksum(frame) == 0
}

/// Trailer big-endian para `payload`.
///
/// Ao contrário de todos os outros campos multi-byte do protocolo, o CRC
/// trafega em big-endian.
pub fn trailer(payload: &[u8]) -> [u8; 2] {
    checksum(payload).to_be_bytes()
}

/// Retorna `payload` seguido do seu trailer.
pub fn append_trailer(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&trailer(payload));
    frame
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const XMODEM: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

    #[test]
    fn table_matches_known_entries() {
        assert_eq!(CRC_TABLE[0], 0x0000);
        assert_eq!(CRC_TABLE[1], 0x1021);
        assert_eq!(CRC_TABLE[2], 0x2042);
        assert_eq!(CRC_TABLE[16], 0x1231);
        assert_eq!(CRC_TABLE[255], 0x1EF0);
    }

    #[test]
    fn matches_reference_implementation() {
        let samples: [&[u8]; 4] = [b"", b"123456789", b"LOO\x14\x01", &[0xFF; 97]];
        for s in samples {
            assert_eq!(checksum(s), XMODEM.checksum(s), "sample {s:?}");
        }
        assert_eq!(checksum(b"123456789"), 0x31C3);
    }

    #[test]
    fn trailer_resolves_to_zero() {
        let payload = b"\x00\x10\x20\x30console";
        let frame = append_trailer(payload);
        assert_eq!(frame.len(), payload.len() + 2);
        assert!(is_valid(&frame));
    }

    #[test]
    fn trailer_is_order_sensitive() {
        let payload = b"\x01\x02\x03\x04";
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&checksum(b"\x04\x03\x02\x01").to_be_bytes());
        assert!(!is_valid(&frame));

        // Trailer em little-endian não valida
        let crc = checksum(payload);
        let mut swapped = payload.to_vec();
        swapped.extend_from_slice(&crc.to_le_bytes());
        if crc.swap_bytes() != crc {
            assert!(!is_valid(&swapped));
        }
    }

    #[test]
    fn incremental_equals_one_shot() {
        let data = b"EEBRD 2B 01\n";
        let mut crc = Crc16::new();
        crc.update(&data[..4]);
        crc.update(&data[4..]);
        assert_eq!(crc.value(), checksum(data));
    }
}

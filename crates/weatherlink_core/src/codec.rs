//! Codec de registros binários dirigido por tabelas de layout.
//!
//! Cada tipo de registro declara um [`Layout`]: a sequência ordenada de slots
//! little-endian que compõem o buffer. Cada slot tem um papel:
//!
//! - **campo** ([`FieldDescriptor`]): nome, escala e sentinela;
//! - **verificação**: constante "mágica" que precisa bater (ex.: tipo de
//!   registro = 1), caso contrário o registro é rejeitado;
//! - **especial**: lido cru e tratado depois por uma regra nomeada do tipo de
//!   registro (chuva compactada, carimbo de data, CRC…);
//! - **padding**: ignorado, não ocupa índice.
//!
//! ```text
//! buffer ──► slots crus ──► verificação ──► escala/sentinela ──► Decoded
//! ```

use thiserror::Error;

use crate::types::WindDirection;

/// Erros de decodificação de registros.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{layout}: buffer com {actual} bytes (esperado {expected})")]
    Length {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{layout}: slot {slot} inválido (esperado {expected}, recebido {actual})")]
    Verification {
        layout: &'static str,
        slot: usize,
        expected: String,
        actual: String,
    },

    #[error("{layout}: slot \"{name}\" não existe no layout")]
    MissingSlot {
        layout: &'static str,
        name: &'static str,
    },

    #[error("Código de bússola inválido: {0}")]
    InvalidCompassCode(i64),

    #[error("Tipo de coletor de chuva desconhecido: 0x{0:X}")]
    UnknownRainCollector(u16),

    #[error("Carimbo de data/hora inválido: data {date}, hora {time}")]
    InvalidTimestamp { date: i64, time: i64 },
}

// ──────────────────────────────────────────────
// Declaração de layouts
// ──────────────────────────────────────────────

/// Primitivo binário de um slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prim {
    I8,
    U8,
    I16,
    U16,
    I32,
    /// Sequência de bytes ASCII de tamanho fixo.
    Tag(usize),
    /// Bytes ignorados.
    Pad(usize),
}

impl Prim {
    pub const fn size(self) -> usize {
        match self {
            Prim::I8 | Prim::U8 => 1,
            Prim::I16 | Prim::U16 => 2,
            Prim::I32 => 4,
            Prim::Tag(n) | Prim::Pad(n) => n,
        }
    }
}

/// Conversão de valor cru para valor de engenharia.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Straight,
    Tenths,
    Hundredths,
    Thousandths,
    /// Código 0–15 da rosa dos ventos.
    Compass,
}

/// Descritor de campo: `(nome, escala, sentinela)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub scale: Scale,
    /// Valor cru que significa "não registrado".
    pub sentinel: Option<i64>,
}

/// Valor exigido por um slot de verificação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Int(i64),
    Tag(&'static [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Field(FieldDescriptor),
    Verify(Expected),
    Special(&'static str),
    Padding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub prim: Prim,
    pub role: Role,
}

/// Sentinelas usados pelo console.
pub mod dash {
    pub const LARGE: Option<i64> = Some(32767);
    pub const LARGE_NEGATIVE: Option<i64> = Some(-32768);
    pub const ZERO: Option<i64> = Some(0);
    pub const SMALL: Option<i64> = Some(255);
    pub const NONE: Option<i64> = None;
}

pub const fn field(prim: Prim, name: &'static str, scale: Scale, sentinel: Option<i64>) -> Slot {
    Slot {
        prim,
        role: Role::Field(FieldDescriptor {
            name,
            scale,
            sentinel,
        }),
    }
}

pub const fn verify(prim: Prim, expected: i64) -> Slot {
    Slot {
        prim,
        role: Role::Verify(Expected::Int(expected)),
    }
}

pub const fn tag(expected: &'static [u8]) -> Slot {
    Slot {
        prim: Prim::Tag(expected.len()),
        role: Role::Verify(Expected::Tag(expected)),
    }
}

pub const fn special(prim: Prim, name: &'static str) -> Slot {
    Slot {
        prim,
        role: Role::Special(name),
    }
}

pub const fn pad(n: usize) -> Slot {
    Slot {
        prim: Prim::Pad(n),
        role: Role::Padding,
    }
}

/// Layout completo de um tipo de registro.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub slots: &'static [Slot],
}

impl Layout {
    /// Tamanho exato do buffer, em bytes.
    pub const fn len(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.slots.len() {
            total += self.slots[i].prim.size();
            i += 1;
        }
        total
    }

    /// Slots com índice (padding não conta).
    pub fn indexed(&'static self) -> impl Iterator<Item = (usize, &'static Slot)> {
        self.slots
            .iter()
            .filter(|s| !matches!(s.role, Role::Padding))
            .enumerate()
    }

    /// Índice do slot com o nome dado (campo ou especial).
    pub fn position(&'static self, name: &str) -> Option<usize> {
        self.indexed()
            .find(|(_, s)| match s.role {
                Role::Field(f) => f.name == name,
                Role::Special(n) => n == name,
                _ => false,
            })
            .map(|(i, _)| i)
    }

    /// Decodifica `buf`, que deve ter exatamente [`Layout::len`] bytes.
    pub fn decode<'a>(&'static self, buf: &'a [u8]) -> Result<Decoded<'a>, CodecError> {
        let expected = self.len();
        if buf.len() != expected {
            return Err(CodecError::Length {
                layout: self.name,
                expected,
                actual: buf.len(),
            });
        }

        let mut raw = Vec::with_capacity(self.slots.len());
        let mut offset = 0;
        for slot in self.slots {
            let size = slot.prim.size();
            let bytes = &buf[offset..offset + size];
            offset += size;
            if let Some(value) = read_prim(slot.prim, bytes) {
                raw.push(value);
            }
        }

        let mut values = Vec::with_capacity(raw.len());
        for (index, slot) in self.indexed() {
            let value = match slot.role {
                Role::Verify(expected) => {
                    check(self.name, index, expected, raw[index])?;
                    None
                }
                Role::Field(descriptor) => match raw[index] {
                    Raw::Int(v) => apply(descriptor, v)?,
                    Raw::Tag(_) => None,
                },
                Role::Special(_) | Role::Padding => None,
            };
            values.push(value);
        }

        Ok(Decoded {
            layout: self,
            raw,
            values,
        })
    }
}

fn read_prim(prim: Prim, b: &[u8]) -> Option<Raw<'_>> {
    let value = match prim {
        Prim::I8 => Raw::Int(b[0] as i8 as i64),
        Prim::U8 => Raw::Int(b[0] as i64),
        Prim::I16 => Raw::Int(i16::from_le_bytes([b[0], b[1]]) as i64),
        Prim::U16 => Raw::Int(u16::from_le_bytes([b[0], b[1]]) as i64),
        Prim::I32 => Raw::Int(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64),
        Prim::Tag(_) => Raw::Tag(b),
        Prim::Pad(_) => return None,
    };
    Some(value)
}

fn check(layout: &'static str, slot: usize, expected: Expected, actual: Raw<'_>) -> Result<(), CodecError> {
    let ok = match (expected, actual) {
        (Expected::Int(e), Raw::Int(a)) => e == a,
        (Expected::Tag(e), Raw::Tag(a)) => e == a,
        _ => false,
    };
    if ok {
        return Ok(());
    }
    Err(CodecError::Verification {
        layout,
        slot,
        expected: match expected {
            Expected::Int(e) => e.to_string(),
            Expected::Tag(e) => String::from_utf8_lossy(e).into_owned(),
        },
        actual: actual.to_string(),
    })
}

fn apply(descriptor: FieldDescriptor, raw: i64) -> Result<Option<Value>, CodecError> {
    if descriptor.sentinel == Some(raw) {
        return Ok(None);
    }
    let value = match descriptor.scale {
        Scale::Straight => Value::Number(raw as f64),
        Scale::Tenths => Value::Number(raw as f64 * 0.1),
        Scale::Hundredths => Value::Number(raw as f64 * 0.01),
        Scale::Thousandths => Value::Number(raw as f64 * 0.001),
        Scale::Compass => {
            let code = u8::try_from(raw).map_err(|_| CodecError::InvalidCompassCode(raw))?;
            Value::Direction(WindDirection::from_code(code).ok_or(CodecError::InvalidCompassCode(raw))?)
        }
    };
    Ok(Some(value))
}

// ──────────────────────────────────────────────
// Resultado da decodificação
// ──────────────────────────────────────────────

/// Valor cru de um slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raw<'a> {
    Int(i64),
    Tag(&'a [u8]),
}

impl std::fmt::Display for Raw<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Raw::Int(v) => write!(f, "{v}"),
            Raw::Tag(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

/// Valor de engenharia de um campo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Direction(WindDirection),
}

/// Slots decodificados de um buffer, alinhados ao layout.
///
/// Empresta o buffer de entrada apenas enquanto existir; os registros
/// tipados copiam o que precisam.
#[derive(Debug)]
pub struct Decoded<'a> {
    layout: &'static Layout,
    raw: Vec<Raw<'a>>,
    values: Vec<Option<Value>>,
}

impl<'a> Decoded<'a> {
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Valor numérico escalado (`None` = sentinela ou campo inexistente).
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.value(name)? {
            Value::Number(v) => Some(v),
            Value::Direction(_) => None,
        }
    }

    pub fn direction(&self, name: &str) -> Option<WindDirection> {
        match self.value(name)? {
            Value::Direction(d) => Some(d),
            Value::Number(_) => None,
        }
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.values[self.layout.position(name)?]
    }

    /// Valor cru de um slot nomeado, usado pelas regras especiais.
    pub fn raw(&self, name: &'static str) -> Result<i64, CodecError> {
        let missing = CodecError::MissingSlot {
            layout: self.layout.name,
            name,
        };
        match self.layout.position(name).map(|i| self.raw[i]) {
            Some(Raw::Int(v)) => Ok(v),
            _ => Err(missing),
        }
    }

    /// Bytes crus de um slot de texto nomeado.
    pub fn bytes(&self, name: &'static str) -> Result<&'a [u8], CodecError> {
        match self.layout.position(name).map(|i| self.raw[i]) {
            Some(Raw::Tag(b)) => Ok(b),
            _ => Err(CodecError::MissingSlot {
                layout: self.layout.name,
                name,
            }),
        }
    }

    /// Mapa ordenado nome → valor de todos os campos (sem especiais).
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, Option<Value>)> + '_ {
        self.layout.indexed().filter_map(move |(i, slot)| match slot.role {
            Role::Field(f) => Some((f.name, self.values[i])),
            _ => None,
        })
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: Layout = Layout {
        name: "Sample",
        slots: &[
            tag(b"AB"),
            verify(Prim::U8, 7),
            pad(1),
            field(Prim::I16, "temperature", Scale::Tenths, dash::LARGE),
            field(Prim::U16, "pressure", Scale::Thousandths, dash::ZERO),
            field(Prim::U8, "direction", Scale::Compass, dash::SMALL),
            special(Prim::U16, "packed"),
            field(Prim::I32, "count", Scale::Straight, dash::NONE),
        ],
    };

    fn sample_bytes() -> Vec<u8> {
        let mut b = b"AB".to_vec();
        b.push(7);
        b.push(0xEE); // padding
        b.extend_from_slice(&(-125i16).to_le_bytes());
        b.extend_from_slice(&29_921u16.to_le_bytes());
        b.push(4);
        b.extend_from_slice(&0xABCDu16.to_le_bytes());
        b.extend_from_slice(&70_000i32.to_le_bytes());
        b
    }

    #[test]
    fn layout_length_counts_padding() {
        assert_eq!(SAMPLE.len(), 2 + 1 + 1 + 2 + 2 + 1 + 2 + 4);
        assert_eq!(SAMPLE.indexed().count(), 7);
        assert_eq!(SAMPLE.position("temperature"), Some(2));
        assert_eq!(SAMPLE.position("packed"), Some(5));
    }

    #[test]
    fn decodes_and_scales() {
        let bytes = sample_bytes();
        let d = SAMPLE.decode(&bytes).unwrap();
        assert!((d.number("temperature").unwrap() + 12.5).abs() < 1e-9);
        assert!((d.number("pressure").unwrap() - 29.921).abs() < 1e-9);
        assert_eq!(d.direction("direction"), Some(WindDirection::E));
        assert_eq!(d.raw("packed"), Ok(0xABCD));
        assert_eq!(d.number("count"), Some(70_000.0));
        assert_eq!(d.number("packed"), None);
    }

    #[test]
    fn sentinel_is_absent_not_zero() {
        let mut bytes = sample_bytes();
        bytes[4..6].copy_from_slice(&32767i16.to_le_bytes());
        bytes[6..8].copy_from_slice(&0u16.to_le_bytes());
        bytes[8] = 255;
        let d = SAMPLE.decode(&bytes).unwrap();
        assert_eq!(d.value("temperature"), None);
        assert_eq!(d.value("pressure"), None);
        assert_eq!(d.value("direction"), None);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let bytes = sample_bytes();
        let err = SAMPLE.decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Length { expected: 15, actual: 14, .. }));
    }

    #[test]
    fn verification_mismatch_aborts() {
        let mut bytes = sample_bytes();
        bytes[2] = 8;
        assert!(matches!(
            SAMPLE.decode(&bytes),
            Err(CodecError::Verification { slot: 1, .. })
        ));

        let mut bytes = sample_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            SAMPLE.decode(&bytes),
            Err(CodecError::Verification { slot: 0, .. })
        ));
    }

    #[test]
    fn bad_compass_code_is_an_error() {
        let mut bytes = sample_bytes();
        bytes[8] = 16;
        assert_eq!(SAMPLE.decode(&bytes).unwrap_err(), CodecError::InvalidCompassCode(16));
    }

    #[test]
    fn fields_iterate_in_layout_order() {
        let bytes = sample_bytes();
        let d = SAMPLE.decode(&bytes).unwrap();
        let names: Vec<_> = d.fields().map(|(n, _)| n).collect();
        assert_eq!(names, ["temperature", "pressure", "direction", "count"]);
    }

    #[test]
    fn unknown_special_is_reported() {
        let bytes = sample_bytes();
        let d = SAMPLE.decode(&bytes).unwrap();
        assert!(matches!(d.raw("nope"), Err(CodecError::MissingSlot { name: "nope", .. })));
    }
}

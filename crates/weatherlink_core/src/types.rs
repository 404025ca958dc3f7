//! Enumerações compartilhadas pelos registros: direção do vento, tendência
//! barométrica e tipos de coletor de chuva.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Polegadas por centímetro, constante usada pelo software do console.
const INCHES_PER_CENTIMETER: f64 = 0.393701;

/// Código bruto que não pertence a nenhuma variante da enumeração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Código inválido para {kind}: {code}")]
pub struct InvalidCode {
    pub kind: &'static str,
    pub code: i32,
}

// ──────────────────────────────────────────────
// Direção do vento
// ──────────────────────────────────────────────

/// Rosa dos ventos de 16 pontos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl WindDirection {
    /// Todos os pontos na ordem do código do console (0–15).
    pub const ALL: [WindDirection; 16] = [
        Self::N,
        Self::NNE,
        Self::NE,
        Self::ENE,
        Self::E,
        Self::ESE,
        Self::SE,
        Self::SSE,
        Self::S,
        Self::SSW,
        Self::SW,
        Self::WSW,
        Self::W,
        Self::WNW,
        Self::NW,
        Self::NNW,
    ];

    /// Código do console (0 = N … 15 = NNW).
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Converte o código de bússola usado nos registros de arquivo.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Graus canônicos do ponto. N é 360, nunca 0.
    pub fn degrees(self) -> f64 {
        match self {
            Self::N => 360.0,
            other => other.code() as f64 * 22.5,
        }
    }

    /// Ponto mais próximo para um valor em graus (1–360).
    ///
    /// Cada ponto k cobre `[22.5k - 10.5, 22.5k + 12)`; N cobre 350–360 e
    /// 1–11. Zero ou valores fora de [1, 360] significam "sem vento".
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        if !(1.0..=360.0).contains(&degrees) {
            return None;
        }
        let sector = ((degrees + 10.5) / 22.5).floor() as usize % 16;
        Some(Self::ALL[sector])
    }
}

// ──────────────────────────────────────────────
// Tendência barométrica
// ──────────────────────────────────────────────

/// Tendência barométrica das últimas 3 horas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarometricTrend {
    FallingRapidly,
    FallingSlowly,
    Steady,
    RisingSlowly,
    RisingRapidly,
}

impl BarometricTrend {
    pub const fn code(self) -> i8 {
        match self {
            Self::FallingRapidly => -60,
            Self::FallingSlowly => -20,
            Self::Steady => 0,
            Self::RisingSlowly => 20,
            Self::RisingRapidly => 60,
        }
    }
}

impl TryFrom<i8> for BarometricTrend {
    type Error = InvalidCode;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -60 => Ok(Self::FallingRapidly),
            -20 => Ok(Self::FallingSlowly),
            0 => Ok(Self::Steady),
            20 => Ok(Self::RisingSlowly),
            60 => Ok(Self::RisingRapidly),
            _ => Err(InvalidCode {
                kind: "BarometricTrend",
                code: value as i32,
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Coletores de chuva
// ──────────────────────────────────────────────

/// Tipo de coletor conforme os setup bits do console (máscara `0b0011_0000`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RainCollectorTypeSerial {
    #[default]
    #[serde(rename = "inches_0_01")]
    Inches0_01,
    #[serde(rename = "millimeters_0_2")]
    Millimeters0_2,
    #[serde(rename = "millimeters_0_1")]
    Millimeters0_1,
}

impl RainCollectorTypeSerial {
    pub const fn code(self) -> u8 {
        match self {
            Self::Inches0_01 => 0x00,
            Self::Millimeters0_2 => 0x10,
            Self::Millimeters0_1 => 0x20,
        }
    }

    pub fn clicks_to_inches(self, clicks: u32) -> f64 {
        let clicks = clicks as f64;
        match self {
            Self::Inches0_01 => clicks * 0.01,
            Self::Millimeters0_2 => clicks * 0.01 * INCHES_PER_CENTIMETER * 2.0,
            Self::Millimeters0_1 => clicks * 0.01 * INCHES_PER_CENTIMETER,
        }
    }

    pub fn clicks_to_centimeters(self, clicks: u32) -> f64 {
        let clicks = clicks as f64;
        match self {
            Self::Inches0_01 => clicks / INCHES_PER_CENTIMETER * 0.01,
            Self::Millimeters0_2 => clicks * 0.01 * 2.0,
            Self::Millimeters0_1 => clicks * 0.01,
        }
    }
}

impl TryFrom<u8> for RainCollectorTypeSerial {
    type Error = InvalidCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Inches0_01),
            0x10 => Ok(Self::Millimeters0_2),
            0x20 => Ok(Self::Millimeters0_1),
            _ => Err(InvalidCode {
                kind: "RainCollectorTypeSerial",
                code: value as i32,
            }),
        }
    }
}

/// Tipo de coletor gravado nos 4 bits altos da palavra de chuva dos `.wlk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RainCollectorTypeDatabase {
    #[serde(rename = "inches_0_1")]
    Inches0_1,
    #[serde(rename = "inches_0_01")]
    Inches0_01,
    #[serde(rename = "millimeters_0_2")]
    Millimeters0_2,
    #[serde(rename = "millimeters_1_0")]
    Millimeters1_0,
    #[serde(rename = "millimeters_0_1")]
    Millimeters0_1,
}

impl RainCollectorTypeDatabase {
    /// Código de 4 bits (já deslocado para os bits baixos).
    pub const fn code(self) -> u8 {
        match self {
            Self::Inches0_1 => 0x0,
            Self::Inches0_01 => 0x1,
            Self::Millimeters0_2 => 0x2,
            Self::Millimeters1_0 => 0x3,
            Self::Millimeters0_1 => 0x6,
        }
    }

    pub fn clicks_to_inches(self, clicks: u32) -> f64 {
        let clicks = clicks as f64;
        match self {
            Self::Inches0_1 => clicks * 0.1,
            Self::Inches0_01 => clicks * 0.01,
            Self::Millimeters0_2 => clicks * 0.01 * INCHES_PER_CENTIMETER * 2.0,
            Self::Millimeters1_0 => clicks * 0.1 * INCHES_PER_CENTIMETER,
            Self::Millimeters0_1 => clicks * 0.01 * INCHES_PER_CENTIMETER,
        }
    }

    pub fn clicks_to_centimeters(self, clicks: u32) -> f64 {
        let clicks = clicks as f64;
        match self {
            Self::Inches0_1 => clicks / INCHES_PER_CENTIMETER * 0.1,
            Self::Inches0_01 => clicks / INCHES_PER_CENTIMETER * 0.01,
            Self::Millimeters0_2 => clicks * 0.01 * 2.0,
            Self::Millimeters1_0 => clicks * 0.1,
            Self::Millimeters0_1 => clicks * 0.01,
        }
    }
}

impl TryFrom<u8> for RainCollectorTypeDatabase {
    type Error = InvalidCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Inches0_1),
            0x1 => Ok(Self::Inches0_01),
            0x2 => Ok(Self::Millimeters0_2),
            0x3 => Ok(Self::Millimeters1_0),
            0x6 => Ok(Self::Millimeters0_1),
            _ => Err(InvalidCode {
                kind: "RainCollectorTypeDatabase",
                code: value as i32,
            }),
        }
    }
}

/// Tipo de coletor associado a um registro, de qualquer um dos dois espaços
/// de código.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RainCollectorType {
    Serial(RainCollectorTypeSerial),
    Database(RainCollectorTypeDatabase),
}

impl RainCollectorType {
    pub fn clicks_to_inches(self, clicks: u32) -> f64 {
        match self {
            Self::Serial(t) => t.clicks_to_inches(clicks),
            Self::Database(t) => t.clicks_to_inches(clicks),
        }
    }

    pub fn clicks_to_centimeters(self, clicks: u32) -> f64 {
        match self {
            Self::Serial(t) => t.clicks_to_centimeters(clicks),
            Self::Database(t) => t.clicks_to_centimeters(clicks),
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

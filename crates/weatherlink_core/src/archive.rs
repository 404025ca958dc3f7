//! Estrutura dos arquivos de arquivo mensal do WeatherLink (`YYYY-MM.wlk`).
//!
//! ```text
//! ┌────────────────────────────┬─────────────────────────────────────────┐
//! │ Header (212)               │ versão(16) total(4) 32 × DayIndex(6)    │
//! ├────────────────────────────┼─────────────────────────────────────────┤
//! │ dia 1: DailySummary (176)  │ ocupa 2 slots de 88 bytes               │
//! │        N-2 × Interval (88) │                                         │
//! │ dia 2: …                   │                                         │
//! └────────────────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! O slot 0 do índice de dias não é usado: o dia 1 do mês fica no slot 1.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{CodecError, Decoded, Layout, Prim, Scale, dash, field, pad, special, verify};
use crate::timestamp;
use crate::types::{RainCollectorType, RainCollectorTypeDatabase, WindDirection};

/// Tamanho do slot de registro no arquivo.
pub const RECORD_LENGTH_WLK: usize = 88;
pub const DAILY_SUMMARY_LENGTH: usize = RECORD_LENGTH_WLK * 2;
pub const DAY_INDEX_LENGTH: usize = 6;
pub const DAY_INDEX_COUNT: usize = 32;
pub const HEADER_LENGTH: usize = 20 + DAY_INDEX_COUNT * DAY_INDEX_LENGTH;

/// Erros de leitura de arquivos `.wlk`.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registro inválido: {0}")]
    Codec(#[from] CodecError),

    #[error("Nome de arquivo inválido (esperado YYYY-MM.wlk): {0}")]
    InvalidFileName(String),

    #[error("Dia {day} não existe em {year}-{month:02}")]
    InvalidDay { year: i32, month: u32, day: u32 },
}

// ──────────────────────────────────────────────
// Layouts
// ──────────────────────────────────────────────

static HEADER_PREFIX: Layout = Layout {
    name: "Header",
    slots: &[
        special(Prim::Tag(16), "version_code"),
        field(Prim::I32, "record_count", Scale::Straight, dash::NONE),
    ],
};

static DAY_INDEX: Layout = Layout {
    name: "DayIndex",
    slots: &[
        field(Prim::I16, "record_count", Scale::Straight, dash::NONE),
        field(Prim::I32, "start_index", Scale::Straight, dash::NONE),
    ],
};

static DAILY_SUMMARY: Layout = Layout {
    name: "DailySummary",
    slots: &[
        verify(Prim::I8, 2),
        pad(1),
        field(Prim::I16, "minutes", Scale::Straight, dash::NONE),
        field(Prim::I16, "temperature_outside_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "temperature_outside_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_inside_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "temperature_inside_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_outside_average", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_inside_average", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "wind_chill_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "wind_chill_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "dew_point_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "dew_point_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "wind_chill_average", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "dew_point_average", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "humidity_outside_high", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "humidity_outside_low", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "humidity_inside_high", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "humidity_inside_low", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "humidity_outside_average", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "barometric_pressure_high", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "barometric_pressure_low", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "barometric_pressure_average", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "wind_speed_high", Scale::Tenths, dash::ZERO),
        field(Prim::I16, "wind_speed_average", Scale::Tenths, dash::ZERO),
        field(Prim::I16, "wind_daily_run", Scale::Tenths, dash::ZERO),
        field(Prim::I16, "wind_speed_high_10_minute_average", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::U8, "wind_speed_high_direction", Scale::Compass, dash::SMALL),
        field(Prim::U8, "wind_speed_high_10_minute_average_direction", Scale::Compass, dash::SMALL),
        field(Prim::I16, "rain_total", Scale::Thousandths, dash::NONE),
        field(Prim::I16, "rain_rate_high", Scale::Hundredths, dash::NONE),
        // UV dose, UV alto e horários
        pad(2 + 1 + 27),
        verify(Prim::I8, 3),
        // reservado + "tempo de hoje"
        pad(1 + 2),
        field(Prim::I16, "total_wind_packets", Scale::Straight, dash::LARGE_NEGATIVE),
        // solar, insolação e evapotranspiração
        pad(8),
        field(Prim::I16, "heat_index_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "heat_index_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "heat_index_average", Scale::Tenths, dash::LARGE),
        // índice THSW alto/baixo
        pad(4),
        field(Prim::I16, "thw_index_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "thw_index_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "integrated_heating_degree_days", Scale::Tenths, dash::ZERO),
        field(Prim::I16, "temperature_wet_bulb_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "temperature_wet_bulb_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_wet_bulb_average", Scale::Tenths, dash::LARGE),
        // bins de direção + horários
        pad(24 + 15),
        field(Prim::I16, "integrated_cooling_degree_days", Scale::Tenths, dash::ZERO),
        pad(11),
    ],
};

static INTERVAL_WLK: Layout = Layout {
    name: "ArchiveIntervalRecord(wlk)",
    slots: &[
        verify(Prim::I8, 1),
        field(Prim::U8, "minutes_covered", Scale::Straight, dash::NONE),
        // flags de ícone
        pad(2),
        field(Prim::I16, "minutes_past_midnight", Scale::Straight, dash::NONE),
        field(Prim::I16, "temperature_outside", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_outside_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "temperature_outside_low", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_inside", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "barometric_pressure", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "humidity_outside", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "humidity_inside", Scale::Tenths, dash::SMALL),
        special(Prim::U16, "rain_code"),
        special(Prim::U16, "rain_rate_clicks"),
        field(Prim::I16, "wind_speed", Scale::Tenths, dash::SMALL),
        field(Prim::I16, "wind_speed_high", Scale::Tenths, dash::ZERO),
        field(Prim::U8, "wind_direction_prevailing", Scale::Compass, dash::SMALL),
        field(Prim::U8, "wind_direction_speed_high", Scale::Compass, dash::SMALL),
        field(Prim::I16, "number_of_wind_samples", Scale::Straight, dash::ZERO),
        field(Prim::I16, "solar_radiation", Scale::Straight, dash::LARGE_NEGATIVE),
        field(Prim::I16, "solar_radiation_high", Scale::Straight, dash::LARGE_NEGATIVE),
        field(Prim::U8, "uv_index", Scale::Tenths, dash::SMALL),
        field(Prim::U8, "uv_index_high", Scale::Tenths, dash::SMALL),
        pad(50),
    ],
};

const _: () = assert!(HEADER_PREFIX.len() + DAY_INDEX_COUNT * DAY_INDEX.len() == HEADER_LENGTH);
const _: () = assert!(DAY_INDEX.len() == DAY_INDEX_LENGTH);
const _: () = assert!(DAILY_SUMMARY.len() == DAILY_SUMMARY_LENGTH);
const _: () = assert!(INTERVAL_WLK.len() == RECORD_LENGTH_WLK);

// ──────────────────────────────────────────────
// Header e índice de dias
// ──────────────────────────────────────────────

/// Localiza os registros de um dia dentro do arquivo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayIndex {
    /// Slots de 88 bytes ocupados pelo dia (resumo conta como 2).
    pub record_count: i16,
    /// Primeiro slot do dia, contado a partir do fim do header.
    pub start_index: i32,
}

impl DayIndex {
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let d = DAY_INDEX.decode(buf)?;
        Ok(Self {
            record_count: d.raw("record_count")? as i16,
            start_index: d.raw("start_index")? as i32,
        })
    }
}

/// Header do arquivo `.wlk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version_code: String,
    pub record_count: i32,
    pub day_indexes: [DayIndex; DAY_INDEX_COUNT],
}

impl Header {
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != HEADER_LENGTH {
            return Err(CodecError::Length {
                layout: HEADER_PREFIX.name,
                expected: HEADER_LENGTH,
                actual: buf.len(),
            });
        }
        let (prefix, indexes) = buf.split_at(HEADER_PREFIX.len());
        let d = HEADER_PREFIX.decode(prefix)?;

        let mut day_indexes = [DayIndex::default(); DAY_INDEX_COUNT];
        for (slot, chunk) in day_indexes.iter_mut().zip(indexes.chunks_exact(DAY_INDEX_LENGTH)) {
            *slot = DayIndex::decode(chunk)?;
        }

        Ok(Self {
            version_code: String::from_utf8_lossy(d.bytes("version_code")?)
                .trim_end_matches('\0')
                .to_string(),
            record_count: d.raw("record_count")? as i32,
            day_indexes,
        })
    }
}

// ──────────────────────────────────────────────
// Resumo diário
// ──────────────────────────────────────────────

/// Resumo de um dia, primeiro bloco de cada dia no arquivo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Minutos cobertos pelos registros do dia.
    pub minutes: i32,
    pub temperature_outside_high: Option<f64>,
    pub temperature_outside_low: Option<f64>,
    pub temperature_inside_high: Option<f64>,
    pub temperature_inside_low: Option<f64>,
    pub temperature_outside_average: Option<f64>,
    pub temperature_inside_average: Option<f64>,
    pub wind_chill_high: Option<f64>,
    pub wind_chill_low: Option<f64>,
    pub dew_point_high: Option<f64>,
    pub dew_point_low: Option<f64>,
    pub wind_chill_average: Option<f64>,
    pub dew_point_average: Option<f64>,
    pub humidity_outside_high: Option<f64>,
    pub humidity_outside_low: Option<f64>,
    pub humidity_inside_high: Option<f64>,
    pub humidity_inside_low: Option<f64>,
    pub humidity_outside_average: Option<f64>,
    pub barometric_pressure_high: Option<f64>,
    pub barometric_pressure_low: Option<f64>,
    pub barometric_pressure_average: Option<f64>,
    pub wind_speed_high: Option<f64>,
    pub wind_speed_average: Option<f64>,
    pub wind_daily_run: Option<f64>,
    pub wind_speed_high_10_minute_average: Option<f64>,
    pub wind_speed_high_direction: Option<WindDirection>,
    pub wind_speed_high_10_minute_average_direction: Option<WindDirection>,
    pub rain_total: Option<f64>,
    pub rain_rate_high: Option<f64>,
    pub total_wind_packets: Option<f64>,
    pub heat_index_high: Option<f64>,
    pub heat_index_low: Option<f64>,
    pub heat_index_average: Option<f64>,
    pub thw_index_high: Option<f64>,
    pub thw_index_low: Option<f64>,
    pub integrated_heating_degree_days: Option<f64>,
    pub temperature_wet_bulb_high: Option<f64>,
    pub temperature_wet_bulb_low: Option<f64>,
    pub temperature_wet_bulb_average: Option<f64>,
    pub integrated_cooling_degree_days: Option<f64>,
}

impl DailySummary {
    pub fn from_wlk(buf: &[u8], date: NaiveDate) -> Result<Self, CodecError> {
        let d = DAILY_SUMMARY.decode(buf)?;
        let n = |name| d.number(name);

        Ok(Self {
            date,
            minutes: d.raw("minutes")? as i32,
            temperature_outside_high: n("temperature_outside_high"),
            temperature_outside_low: n("temperature_outside_low"),
            temperature_inside_high: n("temperature_inside_high"),
            temperature_inside_low: n("temperature_inside_low"),
            temperature_outside_average: n("temperature_outside_average"),
            temperature_inside_average: n("temperature_inside_average"),
            wind_chill_high: n("wind_chill_high"),
            wind_chill_low: n("wind_chill_low"),
            dew_point_high: n("dew_point_high"),
            dew_point_low: n("dew_point_low"),
            wind_chill_average: n("wind_chill_average"),
            dew_point_average: n("dew_point_average"),
            humidity_outside_high: n("humidity_outside_high"),
            humidity_outside_low: n("humidity_outside_low"),
            humidity_inside_high: n("humidity_inside_high"),
            humidity_inside_low: n("humidity_inside_low"),
            humidity_outside_average: n("humidity_outside_average"),
            barometric_pressure_high: n("barometric_pressure_high"),
            barometric_pressure_low: n("barometric_pressure_low"),
            barometric_pressure_average: n("barometric_pressure_average"),
            wind_speed_high: n("wind_speed_high"),
            wind_speed_average: n("wind_speed_average"),
            wind_daily_run: n("wind_daily_run"),
            wind_speed_high_10_minute_average: n("wind_speed_high_10_minute_average"),
            wind_speed_high_direction: d.direction("wind_speed_high_direction"),
            wind_speed_high_10_minute_average_direction: d
                .direction("wind_speed_high_10_minute_average_direction"),
            rain_total: n("rain_total"),
            rain_rate_high: n("rain_rate_high"),
            total_wind_packets: n("total_wind_packets"),
            heat_index_high: n("heat_index_high"),
            heat_index_low: n("heat_index_low"),
            heat_index_average: n("heat_index_average"),
            thw_index_high: n("thw_index_high"),
            thw_index_low: n("thw_index_low"),
            integrated_heating_degree_days: n("integrated_heating_degree_days"),
            temperature_wet_bulb_high: n("temperature_wet_bulb_high"),
            temperature_wet_bulb_low: n("temperature_wet_bulb_low"),
            temperature_wet_bulb_average: n("temperature_wet_bulb_average"),
            integrated_cooling_degree_days: n("integrated_cooling_degree_days"),
        })
    }
}

// ──────────────────────────────────────────────
// Registro de intervalo
// ──────────────────────────────────────────────

/// Origem do registro: os dois formatos têm campos e offsets diferentes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordOrigin {
    Wlk,
    Download,
}

/// Fotografia periódica da estação (um intervalo de arquivo).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveIntervalRecord {
    pub origin: RecordOrigin,
    pub date: NaiveDateTime,
    /// Carimbo compactado (ver [`crate::timestamp`]).
    pub timestamp: i32,
    pub minutes_covered: u16,
    /// Só existe no formato `.wlk`.
    pub minutes_past_midnight: Option<u16>,
    pub temperature_outside: Option<f64>,
    pub temperature_outside_high: Option<f64>,
    pub temperature_outside_low: Option<f64>,
    pub temperature_inside: Option<f64>,
    pub barometric_pressure: Option<f64>,
    pub humidity_outside: Option<f64>,
    pub humidity_inside: Option<f64>,
    pub rain_collector_type: RainCollectorType,
    pub rain_amount_clicks: u32,
    pub rain_rate_clicks: u32,
    /// Chuva no intervalo (polegadas).
    pub rain_amount: f64,
    /// Taxa máxima de chuva (polegadas/hora).
    pub rain_rate: f64,
    pub wind_speed: Option<f64>,
    pub wind_speed_high: Option<f64>,
    pub wind_direction_prevailing: Option<WindDirection>,
    pub wind_direction_speed_high: Option<WindDirection>,
    pub wind_direction_prevailing_degrees: Option<f64>,
    pub wind_direction_speed_high_degrees: Option<f64>,
    pub number_of_wind_samples: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub solar_radiation_high: Option<f64>,
    pub uv_index: Option<f64>,
    pub uv_index_high: Option<f64>,
    /// Só existe no download web (na virada de cada hora).
    pub evapotranspiration: Option<f64>,
}

impl ArchiveIntervalRecord {
    /// Decodifica um registro de 88 bytes do arquivo `.wlk` do dia `date`.
    pub fn from_wlk(buf: &[u8], date: NaiveDate) -> Result<Self, CodecError> {
        let d = INTERVAL_WLK.decode(buf)?;

        // 4 bits altos: tipo de coletor, 12 bits baixos: cliques
        let rain_code = d.raw("rain_code")? as u16;
        let collector = RainCollectorTypeDatabase::try_from((rain_code >> 12) as u8)
            .map_err(|_| CodecError::UnknownRainCollector(rain_code & 0xF000))?;
        let rain_collector_type = RainCollectorType::Database(collector);
        let rain_amount_clicks = (rain_code & 0x0FFF) as u32;
        let rain_rate_clicks = d.raw("rain_rate_clicks")? as u32;

        let minutes_past_midnight = d.raw("minutes_past_midnight")?;
        let date = date.and_time(NaiveTime::default()) + TimeDelta::minutes(minutes_past_midnight);

        Ok(Self::assemble(
            &d,
            RecordOrigin::Wlk,
            date,
            d.raw("minutes_covered")? as u16,
            Some(minutes_past_midnight as u16),
            rain_collector_type,
            rain_amount_clicks,
            rain_rate_clicks,
        ))
    }

    /// Monta o registro a partir dos campos comuns aos dois layouts.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        d: &Decoded<'_>,
        origin: RecordOrigin,
        date: NaiveDateTime,
        minutes_covered: u16,
        minutes_past_midnight: Option<u16>,
        rain_collector_type: RainCollectorType,
        rain_amount_clicks: u32,
        rain_rate_clicks: u32,
    ) -> Self {
        let wind_direction_prevailing = d.direction("wind_direction_prevailing");
        let wind_direction_speed_high = d.direction("wind_direction_speed_high");

        Self {
            origin,
            date,
            timestamp: timestamp::to_packed(date),
            minutes_covered,
            minutes_past_midnight,
            temperature_outside: d.number("temperature_outside"),
            temperature_outside_high: d.number("temperature_outside_high"),
            temperature_outside_low: d.number("temperature_outside_low"),
            temperature_inside: d.number("temperature_inside"),
            barometric_pressure: d.number("barometric_pressure"),
            humidity_outside: d.number("humidity_outside"),
            humidity_inside: d.number("humidity_inside"),
            rain_collector_type,
            rain_amount_clicks,
            rain_rate_clicks,
            rain_amount: rain_collector_type.clicks_to_inches(rain_amount_clicks),
            rain_rate: rain_collector_type.clicks_to_inches(rain_rate_clicks),
            wind_speed: d.number("wind_speed"),
            wind_speed_high: d.number("wind_speed_high"),
            wind_direction_prevailing,
            wind_direction_speed_high,
            wind_direction_prevailing_degrees: wind_direction_prevailing.map(WindDirection::degrees),
            wind_direction_speed_high_degrees: wind_direction_speed_high.map(WindDirection::degrees),
            number_of_wind_samples: d.number("number_of_wind_samples"),
            solar_radiation: d.number("solar_radiation"),
            solar_radiation_high: d.number("solar_radiation_high"),
            uv_index: d.number("uv_index"),
            uv_index_high: d.number("uv_index_high"),
            evapotranspiration: d.number("evapotranspiration"),
        }
    }
}

// ──────────────────────────────────────────────
// Leitura do arquivo
// ──────────────────────────────────────────────

/// Resumo e registros de um dia.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveDay {
    pub summary: DailySummary,
    pub records: Vec<ArchiveIntervalRecord>,
}

/// Conteúdo completo de um arquivo mensal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveFile {
    pub year: i32,
    pub month: u32,
    pub header: Header,
    /// Dias com registros, indexados pelo dia do mês.
    pub days: BTreeMap<u32, ArchiveDay>,
}

impl ArchiveFile {
    /// Abre e decodifica um arquivo `YYYY-MM.wlk`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let (year, month) = parse_file_name(path)?;
        let file = File::open(path)?;
        info!("Importando {} ({year}-{month:02})", path.display());
        Self::read(BufReader::new(file), year, month)
    }

    /// Decodifica um arquivo já aberto. Os dias são lidos em sequência, sem
    /// separadores entre registros.
    pub fn read<R: Read>(mut reader: R, year: i32, month: u32) -> Result<Self, ArchiveError> {
        let mut buf = [0u8; HEADER_LENGTH];
        reader.read_exact(&mut buf)?;
        let header = Header::decode(&buf)?;

        let mut days = BTreeMap::new();
        let mut slot = 0i64;
        for (day, index) in header.day_indexes.iter().enumerate().skip(1) {
            if index.record_count <= 0 {
                continue;
            }
            let day = day as u32;
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or(ArchiveError::InvalidDay { year, month, day })?;

            if index.start_index as i64 != slot {
                warn!(
                    "Dia {day}: índice inicial {} difere da posição sequencial {slot}",
                    index.start_index
                );
            }

            let mut summary = [0u8; DAILY_SUMMARY_LENGTH];
            reader.read_exact(&mut summary)?;
            let summary = DailySummary::from_wlk(&summary, date)?;

            let count = (index.record_count as usize).saturating_sub(2);
            let mut records = Vec::with_capacity(count);
            let mut record = [0u8; RECORD_LENGTH_WLK];
            for _ in 0..count {
                reader.read_exact(&mut record)?;
                records.push(ArchiveIntervalRecord::from_wlk(&record, date)?);
            }

            debug!("Dia {day}: {} registros", records.len());
            slot += index.record_count.max(2) as i64;
            days.insert(day, ArchiveDay { summary, records });
        }

        Ok(Self {
            year,
            month,
            header,
            days,
        })
    }

    /// Todos os registros de intervalo, em ordem cronológica de arquivo.
    pub fn records(&self) -> impl Iterator<Item = &ArchiveIntervalRecord> {
        self.days.values().flat_map(|d| d.records.iter())
    }
}

/// Extrai ano e mês de um nome `YYYY-MM.wlk`.
pub fn parse_file_name(path: &Path) -> Result<(i32, u32), ArchiveError> {
    let invalid = || ArchiveError::InvalidFileName(path.display().to_string());

    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let stem = name.strip_suffix(".wlk").ok_or_else(invalid)?;
    let tail = stem
        .len()
        .checked_sub(7)
        .and_then(|start| stem.get(start..))
        .ok_or_else(invalid)?;
    let (year, month) = tail.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn put_i16(buf: &mut [u8], offset: usize, v: i16) {
        buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn summary_bytes() -> Vec<u8> {
        let mut b = vec![0u8; DAILY_SUMMARY_LENGTH];
        b[0] = 2;
        b[88] = 3;
        put_i16(&mut b, 2, 1440);
        put_i16(&mut b, 4, 812); // máx. externa
        put_i16(&mut b, 6, 32767); // mín. externa não registrada
        put_i16(&mut b, 38, 29_950); // pressão máx.
        b[52] = 4; // E
        b[53] = 255;
        put_i16(&mut b, 54, 120); // chuva total
        put_i16(&mut b, 92, -32768);
        put_i16(&mut b, 163, 35);
        b
    }

    fn interval_bytes(minutes_past_midnight: i16, rain_code: u16) -> Vec<u8> {
        let mut b = vec![0u8; RECORD_LENGTH_WLK];
        b[0] = 1;
        b[1] = 5;
        put_i16(&mut b, 4, minutes_past_midnight);
        put_i16(&mut b, 6, 655); // 65.5 °F
        put_i16(&mut b, 8, -32768); // máx. não registrada
        put_i16(&mut b, 10, 650);
        put_i16(&mut b, 12, 712);
        put_i16(&mut b, 14, 30_012);
        put_i16(&mut b, 16, 455);
        put_i16(&mut b, 18, 255); // umidade interna não registrada
        b[20..22].copy_from_slice(&rain_code.to_le_bytes());
        put_i16(&mut b, 22, 14);
        put_i16(&mut b, 24, 32);
        put_i16(&mut b, 26, 95);
        b[28] = 8; // S
        b[29] = 255;
        put_i16(&mut b, 30, 120);
        put_i16(&mut b, 32, -32768);
        put_i16(&mut b, 34, 410);
        b[36] = 23;
        b[37] = 255;
        b
    }

    fn header_bytes(days: &[(usize, i16, i32)], total: i32) -> Vec<u8> {
        let mut b = vec![0u8; HEADER_LENGTH];
        b[..6].copy_from_slice(b"WDAT5.");
        b[16..20].copy_from_slice(&total.to_le_bytes());
        for &(day, count, start) in days {
            let o = 20 + day * DAY_INDEX_LENGTH;
            b[o..o + 2].copy_from_slice(&count.to_le_bytes());
            b[o + 2..o + 6].copy_from_slice(&start.to_le_bytes());
        }
        b
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_index_scenario() {
        let index = DayIndex::decode(&[0x0A, 0x00, 0x00, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(index, DayIndex { record_count: 10, start_index: 256 });
    }

    #[test]
    fn day_index_wrong_length_is_precondition_error() {
        assert!(matches!(
            DayIndex::decode(&[0x0A, 0x00, 0x00]),
            Err(CodecError::Length { expected: 6, actual: 3, .. })
        ));
    }

    #[test]
    fn header_decodes_version_and_days() {
        let bytes = header_bytes(&[(1, 10, 0), (2, 4, 10)], 14);
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.version_code, "WDAT5.");
        assert_eq!(header.record_count, 14);
        assert_eq!(header.day_indexes[0], DayIndex::default());
        assert_eq!(header.day_indexes[2], DayIndex { record_count: 4, start_index: 10 });
    }

    #[test]
    fn daily_summary_decodes_with_sentinels() {
        let s = DailySummary::from_wlk(&summary_bytes(), date(2016, 5, 9)).unwrap();
        assert_eq!(s.minutes, 1440);
        assert!((s.temperature_outside_high.unwrap() - 81.2).abs() < 1e-9);
        assert_eq!(s.temperature_outside_low, None);
        assert!((s.barometric_pressure_high.unwrap() - 29.95).abs() < 1e-9);
        assert_eq!(s.barometric_pressure_low, None);
        assert_eq!(s.wind_speed_high_direction, Some(WindDirection::E));
        assert_eq!(s.wind_speed_high_10_minute_average_direction, None);
        assert!((s.rain_total.unwrap() - 0.12).abs() < 1e-9);
        assert_eq!(s.total_wind_packets, None);
        assert!((s.integrated_cooling_degree_days.unwrap() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn daily_summary_rejects_bad_verification_slots() {
        let mut bytes = summary_bytes();
        bytes[0] = 1;
        assert!(matches!(
            DailySummary::from_wlk(&bytes, date(2016, 5, 9)),
            Err(CodecError::Verification { slot: 0, .. })
        ));

        let mut bytes = summary_bytes();
        bytes[88] = 2;
        assert!(matches!(
            DailySummary::from_wlk(&bytes, date(2016, 5, 9)),
            Err(CodecError::Verification { slot: 30, .. })
        ));
    }

    #[test]
    fn interval_record_decodes_rain_and_wind() {
        // coletor 0.01" (código 1) com 7 cliques
        let bytes = interval_bytes(615, 0x1007);
        let r = ArchiveIntervalRecord::from_wlk(&bytes, date(2016, 5, 9)).unwrap();

        assert_eq!(r.origin, RecordOrigin::Wlk);
        assert_eq!(r.minutes_covered, 5);
        assert_eq!(r.minutes_past_midnight, Some(615));
        assert_eq!(r.date, date(2016, 5, 9).and_hms_opt(10, 15, 0).unwrap());
        assert_eq!(r.timestamp, timestamp::to_packed(r.date));
        assert!((r.temperature_outside.unwrap() - 65.5).abs() < 1e-9);
        assert_eq!(r.temperature_outside_high, None);
        assert_eq!(r.humidity_inside, None);
        assert_eq!(
            r.rain_collector_type,
            RainCollectorType::Database(RainCollectorTypeDatabase::Inches0_01)
        );
        assert_eq!(r.rain_amount_clicks, 7);
        assert!((r.rain_amount - 0.07).abs() < 1e-9);
        assert_eq!(r.rain_rate_clicks, 14);
        assert!((r.rain_rate - 0.14).abs() < 1e-9);
        assert_eq!(r.wind_direction_prevailing, Some(WindDirection::S));
        assert_eq!(r.wind_direction_prevailing_degrees, Some(180.0));
        assert_eq!(r.wind_direction_speed_high, None);
        assert_eq!(r.wind_direction_speed_high_degrees, None);
        assert_eq!(r.solar_radiation, None);
        assert_eq!(r.solar_radiation_high, Some(410.0));
        assert!((r.uv_index.unwrap() - 2.3).abs() < 1e-9);
        assert_eq!(r.evapotranspiration, None);
    }

    #[test]
    fn interval_record_rolls_past_midnight() {
        let bytes = interval_bytes(1440, 0x0000);
        let r = ArchiveIntervalRecord::from_wlk(&bytes, date(2016, 5, 31)).unwrap();
        assert_eq!(r.date, date(2016, 6, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(r.rain_amount, 0.0);
    }

    #[test]
    fn interval_record_unknown_collector_fails() {
        let bytes = interval_bytes(0, 0x4003);
        assert_eq!(
            ArchiveIntervalRecord::from_wlk(&bytes, date(2016, 5, 9)).unwrap_err(),
            CodecError::UnknownRainCollector(0x4000)
        );
    }

    #[test]
    fn interval_record_requires_type_one() {
        let mut bytes = interval_bytes(0, 0);
        bytes[0] = 2;
        assert!(matches!(
            ArchiveIntervalRecord::from_wlk(&bytes, date(2016, 5, 9)),
            Err(CodecError::Verification { slot: 0, .. })
        ));
    }

    #[test]
    fn reads_whole_file() {
        let mut file = header_bytes(&[(1, 4, 0), (3, 3, 4)], 7);
        file.extend(summary_bytes());
        file.extend(interval_bytes(5, 0x1001));
        file.extend(interval_bytes(10, 0x1002));
        file.extend(summary_bytes());
        file.extend(interval_bytes(5, 0x1003));

        let archive = ArchiveFile::read(file.as_slice(), 2016, 5).unwrap();
        assert_eq!(archive.days.len(), 2);
        assert_eq!(archive.days[&1].records.len(), 2);
        assert_eq!(archive.days[&3].records.len(), 1);
        assert_eq!(archive.days[&3].summary.date, date(2016, 5, 3));
        let clicks: Vec<_> = archive.records().map(|r| r.rain_amount_clicks).collect();
        assert_eq!(clicks, [1, 2, 3]);
    }

    #[test]
    fn truncated_file_is_io_error() {
        let mut file = header_bytes(&[(1, 4, 0)], 4);
        file.extend(summary_bytes());
        file.extend(interval_bytes(5, 0x1001));

        assert!(matches!(
            ArchiveFile::read(file.as_slice(), 2016, 5),
            Err(ArchiveError::Io(_))
        ));
    }

    #[test]
    fn parses_file_names() {
        assert_eq!(parse_file_name(Path::new("/data/2016-05.wlk")).unwrap(), (2016, 5));
        assert!(parse_file_name(Path::new("2016-05.txt")).is_err());
        assert!(parse_file_name(Path::new("2016-13.wlk")).is_err());
        assert!(parse_file_name(Path::new("05.wlk")).is_err());
    }
}

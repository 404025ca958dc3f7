//! Pacote LOOP2 de telemetria em tempo real (99 bytes).
//!
//! ```text
//! "LOO" │ tendência │ tipo=1 │ … leituras … │ \n \r │ CRC (big-endian)
//! ```
//!
//! Um CRC que não fecha não é erro: o pacote é entregue com
//! `crc_match = false` e quem consome decide o que fazer.

use serde::Serialize;

use crate::codec::{CodecError, Layout, Prim, Scale, dash, field, pad, special, tag, verify};
use crate::crc;
use crate::types::{BarometricTrend, RainCollectorTypeSerial, WindDirection};

pub const LOOP_PACKET_LENGTH: usize = 99;

/// Tipo de registro reportado para pacotes LOOP2.
pub const LOOP2_RECORD_TYPE: u8 = 2;

const UNUSED: i64 = 0x7FFF;
const UNUSED_BYTE: i64 = 0xFF;

static LOOP2: Layout = Layout {
    name: "LoopPacket(LOOP2)",
    slots: &[
        tag(b"LOO"),
        field(Prim::I8, "barometric_trend", Scale::Straight, Some(80)),
        // 1 = LOOP2, 0 = LOOP1
        verify(Prim::U8, 1),
        verify(Prim::U16, UNUSED),
        field(Prim::U16, "barometric_pressure", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "temperature_inside", Scale::Tenths, dash::LARGE),
        field(Prim::U8, "humidity_inside", Scale::Straight, dash::SMALL),
        field(Prim::I16, "temperature_outside", Scale::Tenths, dash::LARGE),
        field(Prim::U8, "wind_speed", Scale::Straight, dash::SMALL),
        verify(Prim::U8, UNUSED_BYTE),
        field(Prim::U16, "wind_direction_degrees", Scale::Straight, dash::ZERO),
        field(Prim::U16, "wind_speed_10_minute_average", Scale::Tenths, dash::ZERO),
        field(Prim::U16, "wind_speed_2_minute_average", Scale::Tenths, dash::ZERO),
        field(Prim::U16, "wind_speed_10_minute_gust", Scale::Tenths, dash::ZERO),
        field(Prim::U16, "wind_speed_10_minute_gust_direction_degrees", Scale::Straight, dash::ZERO),
        verify(Prim::U16, UNUSED),
        verify(Prim::U16, UNUSED),
        field(Prim::I16, "dew_point", Scale::Straight, dash::SMALL),
        verify(Prim::U8, UNUSED_BYTE),
        field(Prim::U8, "humidity_outside", Scale::Straight, dash::SMALL),
        verify(Prim::U8, UNUSED_BYTE),
        field(Prim::I16, "heat_index", Scale::Straight, dash::SMALL),
        field(Prim::I16, "wind_chill", Scale::Straight, dash::SMALL),
        field(Prim::I16, "thsw_index", Scale::Straight, dash::SMALL),
        special(Prim::U16, "rain_rate_clicks"),
        field(Prim::U8, "uv_index", Scale::Tenths, dash::SMALL),
        field(Prim::U16, "solar_radiation", Scale::Straight, dash::LARGE),
        special(Prim::U16, "rain_clicks_this_storm"),
        // data de início da tempestade
        pad(2),
        special(Prim::U16, "rain_clicks_today"),
        special(Prim::U16, "rain_clicks_15_minutes"),
        special(Prim::U16, "rain_clicks_1_hour"),
        field(Prim::U16, "evapotranspiration", Scale::Thousandths, dash::ZERO),
        special(Prim::U16, "rain_clicks_24_hours"),
        // calibração do barômetro
        pad(11),
        verify(Prim::U8, UNUSED_BYTE),
        // estado do gráfico do console
        pad(1 + 6),
        field(Prim::U8, "minute_in_hour", Scale::Straight, Some(60)),
        pad(3),
        verify(Prim::U16, UNUSED),
        verify(Prim::U16, UNUSED),
        verify(Prim::U16, UNUSED),
        verify(Prim::U16, UNUSED),
        verify(Prim::U16, UNUSED),
        verify(Prim::U16, UNUSED),
        verify(Prim::U8, b'\n' as i64),
        verify(Prim::U8, b'\r' as i64),
        special(Prim::U16, "crc"),
    ],
};

const _: () = assert!(LOOP2.len() == LOOP_PACKET_LENGTH);

/// Leituras instantâneas do console.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopPacket {
    pub record_type: u8,
    /// `false` se o CRC do pacote não fecha.
    pub crc_match: bool,
    /// `None` se ausente ou com código fora da tabela.
    pub barometric_trend: Option<BarometricTrend>,
    pub barometric_pressure: Option<f64>,
    pub temperature_inside: Option<f64>,
    pub humidity_inside: Option<f64>,
    pub temperature_outside: Option<f64>,
    pub humidity_outside: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction_degrees: Option<f64>,
    pub wind_direction: Option<WindDirection>,
    pub wind_speed_10_minute_average: Option<f64>,
    pub wind_speed_2_minute_average: Option<f64>,
    pub wind_speed_10_minute_gust: Option<f64>,
    pub wind_speed_10_minute_gust_direction_degrees: Option<f64>,
    pub wind_speed_10_minute_gust_direction: Option<WindDirection>,
    pub dew_point: Option<f64>,
    pub heat_index: Option<f64>,
    pub wind_chill: Option<f64>,
    pub thsw_index: Option<f64>,
    pub uv_index: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub evapotranspiration: Option<f64>,
    pub minute_in_hour: Option<u8>,
    pub rain_collector_type: RainCollectorTypeSerial,
    pub rain_rate_clicks: u32,
    pub rain_clicks_this_storm: u32,
    pub rain_clicks_today: u32,
    pub rain_clicks_15_minutes: u32,
    pub rain_clicks_1_hour: u32,
    pub rain_clicks_24_hours: u32,
    /// Quantidades em polegadas; `None` quando não houve cliques.
    pub rain_rate: Option<f64>,
    pub rain_amount_this_storm: Option<f64>,
    pub rain_amount_today: Option<f64>,
    pub rain_amount_15_minutes: Option<f64>,
    pub rain_amount_1_hour: Option<f64>,
    pub rain_amount_24_hours: Option<f64>,
}

impl LoopPacket {
    /// Decodifica um pacote LOOP2 completo (incluindo o CRC).
    ///
    /// `collector` converte os cliques de chuva; o pacote não traz essa
    /// informação.
    pub fn decode(buf: &[u8], collector: RainCollectorTypeSerial) -> Result<Self, CodecError> {
        let d = LOOP2.decode(buf)?;
        let crc_match = crc::is_valid(buf);

        let clicks = |name| d.raw(name).map(|v| v as u32);
        let amount = |clicks: u32| (clicks != 0).then(|| collector.clicks_to_inches(clicks));
        let compass = |degrees: Option<f64>| degrees.and_then(WindDirection::from_degrees);

        let rain_rate_clicks = clicks("rain_rate_clicks")?;
        let rain_clicks_this_storm = clicks("rain_clicks_this_storm")?;
        let rain_clicks_today = clicks("rain_clicks_today")?;
        let rain_clicks_15_minutes = clicks("rain_clicks_15_minutes")?;
        let rain_clicks_1_hour = clicks("rain_clicks_1_hour")?;
        let rain_clicks_24_hours = clicks("rain_clicks_24_hours")?;

        let wind_direction_degrees = d.number("wind_direction_degrees");
        let gust_direction_degrees = d.number("wind_speed_10_minute_gust_direction_degrees");

        Ok(Self {
            record_type: LOOP2_RECORD_TYPE,
            crc_match,
            barometric_trend: d
                .number("barometric_trend")
                .and_then(|v| BarometricTrend::try_from(v as i8).ok()),
            barometric_pressure: d.number("barometric_pressure"),
            temperature_inside: d.number("temperature_inside"),
            humidity_inside: d.number("humidity_inside"),
            temperature_outside: d.number("temperature_outside"),
            humidity_outside: d.number("humidity_outside"),
            wind_speed: d.number("wind_speed"),
            wind_direction_degrees,
            wind_direction: compass(wind_direction_degrees),
            wind_speed_10_minute_average: d.number("wind_speed_10_minute_average"),
            wind_speed_2_minute_average: d.number("wind_speed_2_minute_average"),
            wind_speed_10_minute_gust: d.number("wind_speed_10_minute_gust"),
            wind_speed_10_minute_gust_direction_degrees: gust_direction_degrees,
            wind_speed_10_minute_gust_direction: compass(gust_direction_degrees),
            dew_point: d.number("dew_point"),
            heat_index: d.number("heat_index"),
            wind_chill: d.number("wind_chill"),
            thsw_index: d.number("thsw_index"),
            uv_index: d.number("uv_index"),
            solar_radiation: d.number("solar_radiation"),
            evapotranspiration: d.number("evapotranspiration"),
            minute_in_hour: d.number("minute_in_hour").map(|v| v as u8),
            rain_collector_type: collector,
            rain_rate_clicks,
            rain_clicks_this_storm,
            rain_clicks_today,
            rain_clicks_15_minutes,
            rain_clicks_1_hour,
            rain_clicks_24_hours,
            rain_rate: amount(rain_rate_clicks),
            rain_amount_this_storm: amount(rain_clicks_this_storm),
            rain_amount_today: amount(rain_clicks_today),
            rain_amount_15_minutes: amount(rain_clicks_15_minutes),
            rain_amount_1_hour: amount(rain_clicks_1_hour),
            rain_amount_24_hours: amount(rain_clicks_24_hours),
        })
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

//! Formato do download web: bloco de headers `chave=valor` seguido de
//! registros de intervalo de 52 bytes.
//!
//! ```text
//! Model=16\r\n
//! Records=165\r\n
//! MaxRecords=10240\r\n
//! ArchiveInt=5\r\n
//! ConsoleVer=Dec 11 2012\r\n
//! \r\n                       ← só em respostas salvas em arquivo
//! [52 bytes] × Records       ← carimbo de data 0 encerra o fluxo
//! ```

use std::collections::BTreeMap;
use std::io::{BufRead, Read};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::archive::{ArchiveIntervalRecord, RecordOrigin};
use crate::codec::{CodecError, Layout, Prim, Scale, dash, field, pad, special, verify};
use crate::timestamp;
use crate::types::{RainCollectorType, RainCollectorTypeSerial};

pub const RECORD_LENGTH_DOWNLOAD: usize = 52;

/// Único modelo de console aceito pelo serviço.
pub const SUPPORTED_MODEL: &str = "16";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registro inválido: {0}")]
    Codec(#[from] CodecError),

    #[error("Header obrigatório ausente: {0}")]
    MissingHeader(&'static str),

    #[error("Header inválido: {key}={value}")]
    InvalidHeader { key: String, value: String },

    #[error("Linha de header sem '=': {0:?}")]
    MalformedLine(String),

    #[error("Modelo de console não suportado: {0}")]
    UnsupportedModel(String),
}

// ──────────────────────────────────────────────
// Layout
// ──────────────────────────────────────────────

static INTERVAL_DOWNLOAD: Layout = Layout {
    name: "ArchiveIntervalRecord(download)",
    slots: &[
        special(Prim::I16, "date_stamp"),
        special(Prim::I16, "time_stamp"),
        field(Prim::I16, "temperature_outside", Scale::Tenths, dash::LARGE),
        field(Prim::I16, "temperature_outside_high", Scale::Tenths, dash::LARGE_NEGATIVE),
        field(Prim::I16, "temperature_outside_low", Scale::Tenths, dash::LARGE),
        special(Prim::U16, "rain_clicks"),
        special(Prim::U16, "rain_rate_clicks"),
        field(Prim::U16, "barometric_pressure", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "solar_radiation", Scale::Straight, dash::LARGE),
        field(Prim::U16, "number_of_wind_samples", Scale::Straight, dash::ZERO),
        field(Prim::I16, "temperature_inside", Scale::Tenths, dash::LARGE),
        field(Prim::U8, "humidity_inside", Scale::Straight, dash::SMALL),
        field(Prim::U8, "humidity_outside", Scale::Straight, dash::SMALL),
        field(Prim::U8, "wind_speed", Scale::Straight, dash::SMALL),
        field(Prim::U8, "wind_speed_high", Scale::Straight, dash::ZERO),
        field(Prim::U8, "wind_direction_speed_high", Scale::Compass, dash::SMALL),
        field(Prim::U8, "wind_direction_prevailing", Scale::Compass, dash::SMALL),
        field(Prim::U8, "uv_index", Scale::Tenths, dash::SMALL),
        field(Prim::U8, "evapotranspiration", Scale::Thousandths, dash::ZERO),
        field(Prim::I16, "solar_radiation_high", Scale::Straight, dash::LARGE),
        field(Prim::U8, "uv_index_high", Scale::Tenths, dash::SMALL),
        pad(9),
        // tipo do registro: 0x00 = Rev B
        verify(Prim::U8, 0),
        pad(9),
    ],
};

const _: () = assert!(INTERVAL_DOWNLOAD.len() == RECORD_LENGTH_DOWNLOAD);

impl ArchiveIntervalRecord {
    /// Decodifica um registro de 52 bytes do download web.
    ///
    /// `Ok(None)` sinaliza fim de fluxo: carimbo de data menor que 1. Nesse
    /// caso nenhum outro slot é verificado.
    pub fn from_download(buf: &[u8], minutes_covered: u16) -> Result<Option<Self>, CodecError> {
        if buf.len() != RECORD_LENGTH_DOWNLOAD {
            return Err(CodecError::Length {
                layout: INTERVAL_DOWNLOAD.name,
                expected: RECORD_LENGTH_DOWNLOAD,
                actual: buf.len(),
            });
        }
        let date_stamp = i16::from_le_bytes([buf[0], buf[1]]);
        if date_stamp < 1 {
            debug!("Registro com carimbo de data {date_stamp}: fim do fluxo");
            return Ok(None);
        }

        let d = INTERVAL_DOWNLOAD.decode(buf)?;
        let time_stamp = d.raw("time_stamp")?;
        let date = timestamp::from_parts(date_stamp as i32, time_stamp as i32).ok_or(
            CodecError::InvalidTimestamp {
                date: date_stamp as i64,
                time: time_stamp,
            },
        )?;

        let collector = RainCollectorType::Serial(RainCollectorTypeSerial::Inches0_01);
        Ok(Some(Self::assemble(
            &d,
            RecordOrigin::Download,
            date,
            minutes_covered,
            None,
            collector,
            d.raw("rain_clicks")? as u32,
            d.raw("rain_rate_clicks")? as u32,
        )))
    }
}

// ──────────────────────────────────────────────
// Headers
// ──────────────────────────────────────────────

/// Bloco de headers da resposta de download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadHeaders {
    pub model: String,
    /// Registros incluídos nesta resposta.
    pub records: usize,
    /// Máximo de registros que a conta armazena.
    pub max_records: u32,
    /// Intervalo de arquivo do console, em minutos.
    pub archive_interval: u16,
    pub console_version: String,
    /// Headers não reconhecidos (ex.: `VantageTX`).
    pub other: BTreeMap<String, String>,
}

impl DownloadHeaders {
    /// Interpreta linhas `chave=valor`. Linhas vazias são ignoradas.
    pub fn parse(text: &str) -> Result<Self, DownloadError> {
        let mut map = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (k, v) = line
                .split_once('=')
                .ok_or_else(|| DownloadError::MalformedLine(line.to_string()))?;
            map.insert(k.trim().to_string(), v.trim().to_string());
        }

        let model = take(&mut map, "Model")?;
        if model != SUPPORTED_MODEL {
            return Err(DownloadError::UnsupportedModel(model));
        }

        Ok(Self {
            model,
            records: number(&mut map, "Records")?,
            max_records: number(&mut map, "MaxRecords")?,
            archive_interval: number(&mut map, "ArchiveInt")?,
            console_version: take(&mut map, "ConsoleVer")?,
            other: map,
        })
    }

    /// Lê o bloco de headers de uma resposta salva, até a primeira linha
    /// vazia (ou fim do arquivo). O leitor fica posicionado no primeiro
    /// registro.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self, DownloadError> {
        let mut text = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
                break;
            }
            text.push_str(&line);
        }
        Self::parse(&text)
    }
}

fn take(map: &mut BTreeMap<String, String>, key: &'static str) -> Result<String, DownloadError> {
    map.remove(key).ok_or(DownloadError::MissingHeader(key))
}

fn number<N: std::str::FromStr>(map: &mut BTreeMap<String, String>, key: &'static str) -> Result<N, DownloadError> {
    let value = take(map, key)?;
    value.parse().map_err(|_| DownloadError::InvalidHeader {
        key: key.to_string(),
        value,
    })
}

// ──────────────────────────────────────────────
// Leitura do fluxo
// ──────────────────────────────────────────────

/// Lê até `headers.records` registros do fluxo.
///
/// Registros que não decodificam são descartados com aviso; um carimbo de
/// data zerado encerra a leitura.
pub fn read_download_records<R: Read>(
    mut reader: R,
    headers: &DownloadHeaders,
) -> Result<Vec<ArchiveIntervalRecord>, DownloadError> {
    let mut records = Vec::with_capacity(headers.records);
    let mut buf = [0u8; RECORD_LENGTH_DOWNLOAD];

    for i in 0..headers.records {
        reader.read_exact(&mut buf)?;
        match ArchiveIntervalRecord::from_download(&buf, headers.archive_interval) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {
                warn!("Download interrompido no registro {i} (fim do fluxo)");
                break;
            }
            Err(e) => warn!("Registro {i} descartado: {e}"),
        }
    }

    debug!("{} de {} registros lidos", records.len(), headers.records);
    Ok(records)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

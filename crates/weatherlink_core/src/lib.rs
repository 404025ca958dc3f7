//! # WeatherLink Core
//!
//! Decodificação dos dados binários dos consoles Davis Vantage Pro2:
//! arquivos `.wlk`, download web e protocolo serial (EEPROM e pacotes LOOP).
//!
//! ## Módulos
//! - [`crc`] – CRC-16 CCITT dos registros e trailers
//! - [`types`] – Direção do vento, tendência barométrica, coletores de chuva
//! - [`timestamp`] – Carimbo de data/hora compactado
//! - [`codec`] – Decodificador dirigido por tabelas de layout
//! - [`archive`] – Header, índice de dias, resumo diário e registros `.wlk`
//! - [`download`] – Headers e registros do download web
//! - [`loop_packet`] – Pacote LOOP2 em tempo real
//! - [`serial`] – Transporte, ACK/NAK e configurações da EEPROM
//! - [`poller`] – Polling LOOP em primeiro plano ou em segundo plano
//! - [`config`] – Configuração unificada via TOML

pub mod crc;
pub mod types;
pub mod timestamp;
pub mod codec;
pub mod archive;
pub mod download;
pub mod loop_packet;
pub mod serial;
pub mod poller;
pub mod config;

// Re-exports convenientes
pub use archive::{ArchiveFile, ArchiveIntervalRecord, DailySummary, DayIndex, Header, RecordOrigin};
pub use codec::CodecError;
pub use config::AppConfig;
pub use download::{DownloadHeaders, read_download_records};
pub use loop_packet::LoopPacket;
pub use poller::{PacketType, Poller};
pub use serial::{SerialCommunicator, SerialError, TcpTransport, Transport};
pub use types::{BarometricTrend, RainCollectorType, RainCollectorTypeDatabase, RainCollectorTypeSerial, WindDirection};

//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável, com três seções:
//! `[station]`, `[poller]` e `[archive]`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::poller::PacketType;
use crate::serial::DEFAULT_PORT;
use crate::types::RainCollectorTypeSerial;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro ao serializar: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Valor inválido para {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Conexão com o adaptador serial-TCP do console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub host: String,
    pub port: u16,
    /// Timeout de leitura do socket em segundos (0 = bloqueia)
    pub read_timeout_secs: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            read_timeout_secs: 0.0,
        }
    }
}

impl StationConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0.0).then(|| Duration::from_secs_f64(self.read_timeout_secs))
    }
}

/// Ciclos de polling LOOP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// "loop1", "loop2" ou "both" (só loop2 é decodificado)
    pub packet_type: PacketType,
    /// Pacotes pedidos por comando LPS
    pub packets_per_cycle: usize,
    /// Pausa entre ciclos em segundos
    pub cycle_pause_secs: f64,
    /// Quantidade de ciclos (0 = infinito)
    pub cycles: u64,
    /// "auto" (lê os setup bits), "inches_0_01", "millimeters_0_2" ou "millimeters_0_1"
    pub rain_collector: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            packet_type: PacketType::Loop2,
            packets_per_cycle: 20,
            cycle_pause_secs: 0.0,
            cycles: 0,
            rain_collector: "auto".into(),
        }
    }
}

impl PollerConfig {
    /// Coletor fixado na configuração; `None` = detectar no console.
    pub fn rain_collector_override(&self) -> Result<Option<RainCollectorTypeSerial>, ConfigError> {
        match self.rain_collector.as_str() {
            "auto" => Ok(None),
            "inches_0_01" => Ok(Some(RainCollectorTypeSerial::Inches0_01)),
            "millimeters_0_2" => Ok(Some(RainCollectorTypeSerial::Millimeters0_2)),
            "millimeters_0_1" => Ok(Some(RainCollectorTypeSerial::Millimeters0_1)),
            other => Err(ConfigError::InvalidValue {
                key: "poller.rain_collector",
                value: other.to_string(),
            }),
        }
    }
}

/// Arquivos `.wlk` locais.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Diretório onde ficam os `YYYY-MM.wlk`
    pub directory: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("archive"),
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub station: StationConfig,
    pub poller: PollerConfig,
    pub archive: ArchiveConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.station.host.trim().is_empty() {
            errors.push("Host da estação não pode ser vazio".into());
        }
        if self.station.port == 0 {
            errors.push("Porta da estação não pode ser 0".into());
        }
        if self.station.read_timeout_secs < 0.0 {
            errors.push(format!(
                "Timeout de leitura inválido: {}",
                self.station.read_timeout_secs
            ));
        }
        if self.poller.packet_type != PacketType::Loop2 {
            errors.push("Apenas pacotes loop2 são suportados".into());
        }
        if self.poller.packets_per_cycle == 0 {
            errors.push("packets_per_cycle deve ser maior que 0".into());
        }
        if self.poller.cycle_pause_secs < 0.0 || self.poller.cycle_pause_secs > 3600.0 {
            errors.push(format!(
                "Pausa entre ciclos inválida: {} (0–3600)",
                self.poller.cycle_pause_secs
            ));
        }
        if let Err(e) = self.poller.rain_collector_override() {
            errors.push(e.to_string());
        }

        errors
    }
}

//! # WeatherLink Poller
//!
//! Lê pacotes LOOP2 de um console Vantage Pro2 via WeatherLinkIP e
//! decodifica arquivos `.wlk` e respostas do download web.
//!
//! ## Uso
//! ```bash
//! station_poller                               # Polling contínuo (config.toml)
//! station_poller --import archive/2016-05.wlk  # Resumo de um arquivo mensal
//! station_poller --download resposta.bin       # Registros de um download salvo
//! station_poller --config outro.toml           # Config alternativa
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use weatherlink_core::config::AppConfig;
use weatherlink_core::{
    ArchiveFile, DownloadHeaders, LoopPacket, Poller, SerialCommunicator, SerialError, TcpTransport,
    read_download_records,
};

/// Pausa antes de reconectar após um erro de comunicação.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Poll,
    Import(PathBuf),
    Download(PathBuf),
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut config = None;
    let mut command = Command::Poll;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{flag} exige um caminho"))
        };
        match arg.as_str() {
            "--config" => config = Some(value("--config")?),
            "--import" => command = Command::Import(value("--import")?),
            "--download" => command = Command::Download(value("--download")?),
            other => return Err(format!("Argumento desconhecido: {other}")),
        }
    }

    Ok(Args { config, command })
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Carregar config ──
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    let result = match &args.command {
        Command::Poll => run_poller(&config),
        Command::Import(path) => import_archive(&config, path),
        Command::Download(path) => dump_download(path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

// ──────────────────────────────────────────────
// Polling
// ──────────────────────────────────────────────

fn run_poller(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let station = &config.station;
    let transport = TcpTransport::new(station.host.clone(), station.port).with_read_timeout(station.read_timeout());
    let mut poller = Poller::new(SerialCommunicator::new(transport));
    poller.set_packet_type(config.poller.packet_type);

    poller.with_communicator(|c| c.connect())?;

    match config.poller.rain_collector_override()? {
        Some(collector) => poller.set_rain_collector(collector),
        None => {
            if let Err(e) = poller.detect_rain_collector() {
                warn!("Não foi possível ler o coletor de chuva ({e}), usando {:?}", poller.rain_collector());
            }
        }
    }

    let pause = Duration::from_secs_f64(config.poller.cycle_pause_secs);

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌦  WEATHERLINK POLLER – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Console:   {}:{}", station.host, station.port);
    println!("  Pacotes:   {:?} × {}", config.poller.packet_type, config.poller.packets_per_cycle);
    println!("  Coletor:   {:?}", poller.rain_collector());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    let mut cycle = 0u64;
    while config.poller.cycles == 0 || cycle < config.poller.cycles {
        cycle += 1;

        match poll_cycle(&mut poller, config.poller.packets_per_cycle) {
            Ok(count) => debug!("Ciclo {cycle}: {count} pacotes"),
            Err(e @ SerialError::NotImplemented(_)) => return Err(e.into()),
            Err(e) => {
                error!("Ciclo {cycle} falhou: {e}. Reconectando em {}s...", RECONNECT_DELAY.as_secs());
                std::thread::sleep(RECONNECT_DELAY);
                if let Err(e) = poller.with_communicator(|c| {
                    let _ = c.disconnect();
                    c.connect()
                }) {
                    warn!("Falha ao reconectar: {e}");
                }
                continue;
            }
        }

        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }

    poller.with_communicator(|c| c.disconnect())?;
    Ok(())
}

fn poll_cycle(poller: &mut Poller<TcpTransport>, packets: usize) -> Result<usize, SerialError> {
    let rx = poller.start_background_channel(packets)?;
    for packet in rx {
        log_packet(&packet);
    }
    poller.join_background_polling()
}

fn log_packet(p: &LoopPacket) {
    let show = |v: Option<f64>| v.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"));
    info!(
        "LOOP2{} | Ext {}°F {}% | Int {}°F | {} inHg {:?} | Vento {} mph {:?} | Chuva hoje {} in",
        if p.crc_match { "" } else { " (CRC!)" },
        show(p.temperature_outside),
        show(p.humidity_outside),
        show(p.temperature_inside),
        p.barometric_pressure.map_or_else(|| "--".to_string(), |v| format!("{v:.3}")),
        p.barometric_trend,
        show(p.wind_speed),
        p.wind_direction,
        p.rain_amount_today.map_or_else(|| "0.00".to_string(), |v| format!("{v:.2}")),
    );
}

// ──────────────────────────────────────────────
// Arquivos
// ──────────────────────────────────────────────

fn import_archive(config: &AppConfig, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let path = if path.exists() {
        path.to_path_buf()
    } else {
        config.archive.directory.join(path)
    };
    let archive = ArchiveFile::open(&path)?;

    info!(
        "{}: versão {:?}, {} registros no header, {} dias",
        path.display(),
        archive.header.version_code,
        archive.header.record_count,
        archive.days.len()
    );
    for (day, contents) in &archive.days {
        let s = &contents.summary;
        info!(
            "{} | {} registros | Ext {:?}–{:?}°F | Chuva {:?} in | Vento máx {:?} mph {:?}",
            s.date,
            contents.records.len(),
            s.temperature_outside_low,
            s.temperature_outside_high,
            s.rain_total,
            s.wind_speed_high,
            s.wind_speed_high_direction,
        );
        debug!("Dia {day}: {} minutos cobertos", s.minutes);
    }
    Ok(())
}

fn dump_download(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(File::open(path)?);
    let headers = DownloadHeaders::read_from(&mut reader)?;
    info!(
        "Console {} | intervalo {} min | {} registros (máx. {})",
        headers.console_version, headers.archive_interval, headers.records, headers.max_records
    );

    let records = read_download_records(reader, &headers)?;
    for r in &records {
        info!(
            "{} ({}) | Ext {:?}°F | Chuva {:.2} in | Vento {:?} mph {:?}",
            r.date, r.timestamp, r.temperature_outside, r.rain_amount, r.wind_speed, r.wind_direction_prevailing
        );
    }
    info!("{} registros processados", records.len());
    Ok(())
}

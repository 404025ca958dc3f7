//! Polling de pacotes LOOP, em primeiro plano ou numa thread de fundo.
//!
//! ```text
//! → "LPS 2 <n>\n"
//! ← ACK
//! ← n × LOOP2 (99 bytes)      ← "\r" cancela o restante
//! ```
//!
//! O comunicador fica atrás de `Arc<Mutex<_>>`: a thread de fundo segura o
//! lock durante toda a sessão.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::loop_packet::{LOOP_PACKET_LENGTH, LoopPacket};
use crate::serial::{SerialCommunicator, SerialError, Transport};
use crate::types::RainCollectorTypeSerial;

/// Capacidade do channel entregue por [`Poller::start_background_channel`].
const CHANNEL_CAPACITY: usize = 64;

/// Pacotes pedidos ao console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    Loop1,
    #[default]
    Loop2,
    Both,
}

impl PacketType {
    /// Código enviado no comando `LPS`.
    pub const fn code(self) -> u8 {
        match self {
            Self::Loop1 => 1,
            Self::Loop2 => 2,
            Self::Both => 3,
        }
    }
}

type SharedCommunicator<T> = Arc<Mutex<SerialCommunicator<T>>>;

struct Session {
    stop_tx: Sender<()>,
    handle: JoinHandle<Result<usize, SerialError>>,
}

/// Lê pacotes LOOP de um console.
pub struct Poller<T: Transport + 'static> {
    communicator: SharedCommunicator<T>,
    packet_type: PacketType,
    rain_collector: RainCollectorTypeSerial,
    session: Option<Session>,
}

impl<T: Transport + 'static> Poller<T> {
    pub fn new(communicator: SerialCommunicator<T>) -> Self {
        Self {
            communicator: Arc::new(Mutex::new(communicator)),
            packet_type: PacketType::default(),
            rain_collector: RainCollectorTypeSerial::default(),
            session: None,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_type = packet_type;
    }

    pub fn rain_collector(&self) -> RainCollectorTypeSerial {
        self.rain_collector
    }

    /// Coletor usado para converter os cliques de chuva dos pacotes.
    pub fn set_rain_collector(&mut self, collector: RainCollectorTypeSerial) {
        self.rain_collector = collector;
    }

    /// Acesso exclusivo ao comunicador (conectar, ler configurações…).
    ///
    /// Bloqueia enquanto houver uma sessão de fundo rodando.
    pub fn with_communicator<R>(&self, f: impl FnOnce(&mut SerialCommunicator<T>) -> R) -> R {
        f(&mut *lock(&self.communicator))
    }

    /// Lê o tipo de coletor dos setup bits do console e passa a usá-lo.
    pub fn detect_rain_collector(&mut self) -> Result<RainCollectorTypeSerial, SerialError> {
        let code = self.with_communicator(|c| c.read_rain_collector_type())?;
        let collector = RainCollectorTypeSerial::try_from(code)?;
        info!("Coletor de chuva do console: {collector:?}");
        self.rain_collector = collector;
        Ok(collector)
    }

    /// Pede `n` pacotes e os lê de forma síncrona.
    pub fn poll(&self, n: usize) -> Result<Vec<LoopPacket>, SerialError> {
        self.ensure_supported()?;
        if self.is_background_polling() {
            return Err(SerialError::PollingActive);
        }

        let mut comm = lock(&self.communicator);
        send_poll_instruction(&mut *comm, self.packet_type, n)?;
        (0..n)
            .map(|_| receive_packet(&mut *comm, self.rain_collector))
            .collect()
    }

    /// Pede `n` pacotes e entrega cada um a `callback` numa thread de fundo.
    pub fn start_background_polling<F>(&mut self, n: usize, mut callback: F) -> Result<(), SerialError>
    where
        F: FnMut(LoopPacket) + Send + 'static,
    {
        self.start_session(n, move |packet| {
            callback(packet);
            true
        })
    }

    /// Como [`Poller::start_background_polling`], entregando por channel.
    pub fn start_background_channel(&mut self, n: usize) -> Result<Receiver<LoopPacket>, SerialError> {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        self.start_session(n, move |packet| tx.send(packet).is_ok())?;
        Ok(rx)
    }

    /// Sinaliza a thread de fundo para parar no próximo limite de pacote.
    pub fn stop_background_polling(&mut self) -> Result<(), SerialError> {
        let session = self.session.as_ref().ok_or(SerialError::PollingInactive)?;
        // já sinalizado se o channel estiver cheio
        let _ = session.stop_tx.try_send(());
        debug!("Parada do polling solicitada");
        Ok(())
    }

    /// Aguarda a thread de fundo e retorna quantos pacotes ela entregou.
    pub fn join_background_polling(&mut self) -> Result<usize, SerialError> {
        let session = self.session.take().ok_or(SerialError::PollingInactive)?;
        session.handle.join().map_err(|_| SerialError::WorkerPanicked)?
    }

    /// `true` enquanto a thread de fundo estiver rodando.
    pub fn is_background_polling(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.handle.is_finished())
    }

    fn ensure_supported(&self) -> Result<(), SerialError> {
        match self.packet_type {
            PacketType::Loop2 => Ok(()),
            PacketType::Loop1 | PacketType::Both => Err(SerialError::NotImplemented("LOOP1")),
        }
    }

    fn start_session<D>(&mut self, n: usize, deliver: D) -> Result<(), SerialError>
    where
        D: FnMut(LoopPacket) -> bool + Send + 'static,
    {
        self.ensure_supported()?;
        if self.is_background_polling() {
            return Err(SerialError::PollingActive);
        }
        if let Some(finished) = self.session.take() {
            // sessão anterior terminou sem join
            match finished.handle.join() {
                Ok(Ok(count)) => debug!("Sessão anterior entregou {count} pacotes"),
                Ok(Err(e)) => warn!("Sessão anterior terminou com erro: {e}"),
                Err(_) => warn!("Sessão anterior terminou em pânico"),
            }
        }

        send_poll_instruction(&mut *lock(&self.communicator), self.packet_type, n)?;

        let (stop_tx, stop_rx) = bounded(1);
        let communicator = Arc::clone(&self.communicator);
        let collector = self.rain_collector;
        let handle = std::thread::Builder::new()
            .name("loop-poller".into())
            .spawn(move || receive_loop(&communicator, n, collector, &stop_rx, deliver))?;

        info!("Polling em segundo plano iniciado ({n} pacotes)");
        self.session = Some(Session { stop_tx, handle });
        Ok(())
    }
}

fn lock<T: Transport>(communicator: &SharedCommunicator<T>) -> MutexGuard<'_, SerialCommunicator<T>> {
    communicator.lock().unwrap_or_else(PoisonError::into_inner)
}

fn send_poll_instruction<T: Transport>(
    comm: &mut SerialCommunicator<T>,
    packet_type: PacketType,
    n: usize,
) -> Result<(), SerialError> {
    comm.send_instruction(&format!("LPS {} {n}", packet_type.code()), true)
}

fn receive_packet<T: Transport>(
    comm: &mut SerialCommunicator<T>,
    collector: RainCollectorTypeSerial,
) -> Result<LoopPacket, SerialError> {
    let mut buf = [0u8; LOOP_PACKET_LENGTH];
    comm.read_block(&mut buf)?;
    let packet = LoopPacket::decode(&buf, collector)?;
    if !packet.crc_match {
        warn!("Pacote LOOP com CRC inválido");
    }
    Ok(packet)
}

fn receive_loop<T: Transport>(
    communicator: &SharedCommunicator<T>,
    n: usize,
    collector: RainCollectorTypeSerial,
    stop_rx: &Receiver<()>,
    mut deliver: impl FnMut(LoopPacket) -> bool,
) -> Result<usize, SerialError> {
    let mut comm = lock(communicator);
    let mut delivered = 0;

    for _ in 0..n {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                info!("Polling cancelado após {delivered} pacotes");
                comm.send_data(b"\r")?;
                return Ok(delivered);
            }
            Err(TryRecvError::Empty) => {}
        }

        let packet = receive_packet(&mut *comm, collector)?;
        if !deliver(packet) {
            debug!("Consumidor descartado, cancelando polling");
            comm.send_data(b"\r")?;
            return Ok(delivered);
        }
        delivered += 1;
    }

    debug!("Polling concluído: {delivered} pacotes");
    Ok(delivered)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

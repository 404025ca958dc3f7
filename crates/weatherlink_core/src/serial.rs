//! Comunicação serial com o console (via adaptador serial-TCP).
//!
//! Protocolo de instruções:
//! ```text
//! → "EEBRD 2B 01\n"
//! ← 0x06 (ACK)  |  0x15 / 0x21 (NAK)
//! ← payload (little-endian) + CRC (2 bytes, big-endian)
//! ```
//!
//! O [`SerialCommunicator`] não sabe nada sobre o meio físico: qualquer
//! [`Transport`] serve. [`TcpTransport`] é o único vínculo concreto.

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::CodecError;
use crate::crc;
use crate::types::InvalidCode;

/// Porta padrão do WeatherLinkIP.
pub const DEFAULT_PORT: u16 = 22222;

pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
/// Resposta de "comando inválido" de alguns firmwares.
pub const NAK_ALTERNATE: u8 = 0x21;

/// Endereço e tamanho dos setup bits na EEPROM.
pub const SETUP_BITS_ADDRESS: u16 = 0x2B;
pub const SETUP_BITS_LENGTH: u16 = 0x01;
pub const SETUP_BITS_MASK_RAIN_COLLECTOR: u8 = 0b0011_0000;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("Erro de IO: {0}")]
    Io(#[from] io::Error),

    #[error("Já conectado")]
    AlreadyConnected,

    #[error("Não conectado")]
    NotConnected,

    #[error("Instrução não reconhecida pelo console (0x{0:02X})")]
    NotAcknowledged(u8),

    #[error("Esperado ACK 0x06, recebido 0x{0:02X}")]
    InvalidAcknowledgement(u8),

    #[error("CRC de {context} não resolve para zero (0x{residue:04X})")]
    CrcValidation { context: &'static str, residue: u16 },

    #[error("Tamanho do valor ({actual}) difere do tamanho da configuração ({expected})")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Pacote inválido: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuração inválida: {0}")]
    Conversion(#[from] InvalidCode),

    #[error("{0} não é suportado")]
    NotImplemented(&'static str),

    #[error("Polling em segundo plano já está ativo")]
    PollingActive,

    #[error("Nenhum polling em segundo plano ativo")]
    PollingInactive,

    #[error("Thread de polling terminou em pânico")]
    WorkerPanicked,
}

// ──────────────────────────────────────────────
// Transporte
// ──────────────────────────────────────────────

/// Meio físico até o console.
pub trait Transport: Send {
    fn connect(&mut self) -> io::Result<()>;

    fn disconnect(&mut self) -> io::Result<()>;

    fn is_connected(&self) -> bool;

    /// Envia todos os bytes (bloqueante).
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Lê até `n` bytes; pode retornar menos.
    fn read(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Lê exatamente `buf.len()` bytes.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transporte desconectado")
}

/// Conexão TCP com o adaptador serial.
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    read_timeout: Option<Duration>,
    stream: Option<TcpStream>,
    reader: Option<BufReader<TcpStream>>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: None,
            stream: None,
            reader: None,
        }
    }

    /// Timeout de leitura do socket. `None` bloqueia indefinidamente.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> io::Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))?;
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_nodelay(true)?;
        self.reader = Some(BufReader::new(stream.try_clone()?));
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) -> io::Result<()> {
        self.reader = None;
        let stream = self.stream.take().ok_or_else(not_connected)?;
        match stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.write_all(data)?;
        stream.flush()
    }

    fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let reader = self.reader.as_mut().ok_or_else(not_connected)?;
        let mut buf = vec![0u8; n];
        let got = reader.read(&mut buf)?;
        buf.truncate(got);
        Ok(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.as_mut().ok_or_else(not_connected)?.read_exact(buf)
    }
}

// ──────────────────────────────────────────────
// Comunicador
// ──────────────────────────────────────────────

/// Opções de [`SerialCommunicator::read_config_setting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Rejeita a resposta se o CRC não fechar.
    pub confirm_crc: bool,
    /// Mantém os 2 bytes de CRC no retorno.
    pub include_crc: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            confirm_crc: true,
            include_crc: false,
        }
    }
}

/// Classifica o byte de confirmação do console.
pub fn classify_ack(byte: u8) -> Result<(), SerialError> {
    match byte {
        ACK => Ok(()),
        NAK | NAK_ALTERNATE => Err(SerialError::NotAcknowledged(byte)),
        other => Err(SerialError::InvalidAcknowledgement(other)),
    }
}

/// Protocolo de instruções sobre um [`Transport`].
pub struct SerialCommunicator<T: Transport> {
    transport: T,
}

impl<T: Transport> SerialCommunicator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn connect(&mut self) -> Result<(), SerialError> {
        if self.transport.is_connected() {
            return Err(SerialError::AlreadyConnected);
        }
        if let Err(e) = self.transport.connect() {
            // garante o estado desconectado
            if self.transport.is_connected() {
                let _ = self.transport.disconnect();
            }
            return Err(e.into());
        }
        info!("Conectado ao console");
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<(), SerialError> {
        if !self.transport.is_connected() {
            return Err(SerialError::NotConnected);
        }
        self.transport.disconnect()?;
        info!("Desconectado do console");
        Ok(())
    }

    /// Conecta, executa `f` e desconecta.
    ///
    /// Se `f` falhar, o erro de `f` prevalece sobre uma falha ao desconectar.
    pub fn with_connection<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, SerialError>,
    ) -> Result<R, SerialError> {
        self.connect()?;
        let result = f(self);
        let closed = self.disconnect();

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(disconnect)) => {
                warn!("Falha ao desconectar após erro ({e}): {disconnect}");
                Err(e)
            }
        }
    }

    pub fn send_data(&mut self, data: &[u8]) -> Result<(), SerialError> {
        if !self.transport.is_connected() {
            return Err(SerialError::NotConnected);
        }
        self.transport.send(data)?;
        Ok(())
    }

    /// Leitura não bloqueante em tamanho: pode retornar menos que `n`.
    pub fn read_data(&mut self, n: usize) -> Result<Vec<u8>, SerialError> {
        if !self.transport.is_connected() {
            return Err(SerialError::NotConnected);
        }
        Ok(self.transport.read(n)?)
    }

    /// Leitura bufferizada até preencher `buf`.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<(), SerialError> {
        if !self.transport.is_connected() {
            return Err(SerialError::NotConnected);
        }
        self.transport.read_exact(buf)?;
        Ok(())
    }

    /// Lê um byte e exige ACK.
    pub fn confirm_ack(&mut self) -> Result<(), SerialError> {
        let mut byte = [0u8; 1];
        self.read_block(&mut byte)?;
        classify_ack(byte[0])
    }

    /// Envia `command` + `\n` e, se pedido, confirma o ACK.
    pub fn send_instruction(&mut self, command: &str, confirm: bool) -> Result<(), SerialError> {
        debug!("Instrução: {command}");
        let mut data = Vec::with_capacity(command.len() + 1);
        data.extend_from_slice(command.as_bytes());
        data.push(b'\n');
        self.send_data(&data)?;

        if confirm {
            self.confirm_ack()?;
        }
        Ok(())
    }

    /// Lê `length` bytes de configuração a partir de `address` na EEPROM.
    pub fn read_config_setting(
        &mut self,
        address: u16,
        length: u16,
        options: ReadOptions,
    ) -> Result<Vec<u8>, SerialError> {
        self.send_instruction(&format!("EEBRD {address:02X} {length:02X}"), true)?;

        let mut setting = vec![0u8; length as usize + 2];
        self.read_block(&mut setting)?;

        if options.confirm_crc {
            let residue = crc::checksum(&setting);
            if residue != 0 {
                warn!("CRC inválido na leitura de 0x{address:02X}");
                return Err(SerialError::CrcValidation {
                    context: "leitura de configuração",
                    residue,
                });
            }
        }

        if !options.include_crc {
            setting.truncate(length as usize);
        }
        Ok(setting)
    }

    /// Grava `value` (sem CRC) em `address`. O trailer é calculado aqui.
    pub fn write_config_setting(&mut self, address: u16, length: u16, value: &[u8]) -> Result<(), SerialError> {
        if value.len() != length as usize {
            return Err(SerialError::LengthMismatch {
                expected: length as usize,
                actual: value.len(),
            });
        }

        let data = crc::append_trailer(value);
        let residue = crc::checksum(&data);
        if residue != 0 {
            return Err(SerialError::CrcValidation {
                context: "gravação de configuração",
                residue,
            });
        }

        self.send_instruction(&format!("EEBWR {address:02X} {length:02X}"), true)?;
        self.send_data(&data)
    }

    /// Setup bits mascarados com `mask`.
    pub fn read_setup_bit(&mut self, mask: u8) -> Result<u8, SerialError> {
        let bits = self.read_config_setting(SETUP_BITS_ADDRESS, SETUP_BITS_LENGTH, ReadOptions::default())?;
        Ok(bits.first().copied().unwrap_or_default() & mask)
    }

    /// Código cru do coletor de chuva (`0x00`, `0x10` ou `0x20`).
    pub fn read_rain_collector_type(&mut self) -> Result<u8, SerialError> {
        self.read_setup_bit(SETUP_BITS_MASK_RAIN_COLLECTOR)
    }
}

// ──────────────────────────────────────────────
// Transporte roteirizado (testes)
// ──────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Transporte em memória: entrega `input` e registra tudo o que é enviado.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        pub input: VecDeque<u8>,
        pub sent: Arc<Mutex<Vec<u8>>>,
        pub connected: bool,
        pub fail_connect: bool,
        pub fail_disconnect: bool,
    }

    impl ScriptedTransport {
        pub fn new(input: &[u8]) -> Self {
            Self {
                input: input.iter().copied().collect(),
                ..Self::default()
            }
        }

        pub fn connected(input: &[u8]) -> Self {
            Self {
                connected: true,
                ..Self::new(input)
            }
        }

        pub fn sent_log(&self) -> Arc<Mutex<Vec<u8>>> {
            Arc::clone(&self.sent)
        }
    }

    impl Transport for ScriptedTransport {
        fn connect(&mut self) -> io::Result<()> {
            if self.fail_connect {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "recusado"));
            }
            self.connected = true;
            Ok(())
        }

        fn disconnect(&mut self) -> io::Result<()> {
            self.connected = false;
            if self.fail_disconnect {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "quebrado"));
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn send(&mut self, data: &[u8]) -> io::Result<()> {
            self.sent.lock().unwrap().extend_from_slice(data);
            Ok(())
        }

        fn read(&mut self, n: usize) -> io::Result<Vec<u8>> {
            let n = n.min(self.input.len());
            Ok(self.input.drain(..n).collect())
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
            if buf.len() > self.input.len() {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            let len = buf.len();
            for (slot, byte) in buf.iter_mut().zip(self.input.drain(..len)) {
                *slot = byte;
            }
            Ok(())
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use crate::types::RainCollectorTypeSerial;

    fn comm(input: &[u8]) -> SerialCommunicator<ScriptedTransport> {
        SerialCommunicator::new(ScriptedTransport::connected(input))
    }

    fn sent(c: &SerialCommunicator<ScriptedTransport>) -> Vec<u8> {
        c.transport().sent.lock().unwrap().clone()
    }

    #[test]
    fn connection_state_machine() {
        let mut c = SerialCommunicator::new(ScriptedTransport::new(&[]));
        assert!(matches!(c.disconnect(), Err(SerialError::NotConnected)));
        c.connect().unwrap();
        assert!(matches!(c.connect(), Err(SerialError::AlreadyConnected)));
        c.disconnect().unwrap();
        assert!(!c.is_connected());
        assert!(matches!(c.disconnect(), Err(SerialError::NotConnected)));
    }

    #[test]
    fn failed_connect_stays_disconnected() {
        let mut c = SerialCommunicator::new(ScriptedTransport {
            fail_connect: true,
            ..ScriptedTransport::default()
        });
        assert!(matches!(c.connect(), Err(SerialError::Io(_))));
        assert!(!c.is_connected());
    }

    #[test]
    fn ack_classification() {
        assert!(classify_ack(0x06).is_ok());
        assert!(matches!(classify_ack(0x15), Err(SerialError::NotAcknowledged(0x15))));
        assert!(matches!(classify_ack(0x21), Err(SerialError::NotAcknowledged(0x21))));
        assert!(matches!(classify_ack(0x0A), Err(SerialError::InvalidAcknowledgement(0x0A))));
        assert!(matches!(classify_ack(0x00), Err(SerialError::InvalidAcknowledgement(0x00))));
    }

    #[test]
    fn instruction_appends_newline_and_confirms() {
        let mut c = comm(&[ACK, NAK]);
        c.send_instruction("TEST", true).unwrap();
        assert_eq!(sent(&c), b"TEST\n");
        assert!(matches!(
            c.send_instruction("TEST", true),
            Err(SerialError::NotAcknowledged(NAK))
        ));
        c.send_instruction("LAMPS 1", false).unwrap();
        assert_eq!(sent(&c), b"TEST\nTEST\nLAMPS 1\n");
    }

    #[test]
    fn instruction_requires_connection() {
        let mut c = SerialCommunicator::new(ScriptedTransport::new(&[ACK]));
        assert!(matches!(c.send_instruction("TEST", true), Err(SerialError::NotConnected)));
    }

    #[test]
    fn read_data_may_return_less() {
        let mut c = comm(&[1, 2, 3]);
        assert_eq!(c.read_data(8).unwrap(), [1, 2, 3]);
        assert!(c.read_data(8).unwrap().is_empty());
    }

    #[test]
    fn reads_config_setting() {
        let payload = [0x12, 0x34, 0x56];
        let mut input = vec![ACK];
        input.extend(crc::append_trailer(&payload));

        let mut c = comm(&input);
        let value = c.read_config_setting(0x2D, 3, ReadOptions::default()).unwrap();
        assert_eq!(value, payload);
        assert_eq!(sent(&c), b"EEBRD 2D 03\n");

        let mut c = comm(&input);
        let options = ReadOptions {
            include_crc: true,
            ..ReadOptions::default()
        };
        let value = c.read_config_setting(0x2D, 3, options).unwrap();
        assert_eq!(value, crc::append_trailer(&payload));
    }

    #[test]
    fn config_read_crc_failure() {
        let mut input = vec![ACK];
        input.extend(crc::append_trailer(&[0x12, 0x34]));
        input[1] ^= 0xFF;

        let mut c = comm(&input);
        assert!(matches!(
            c.read_config_setting(0x2B, 2, ReadOptions::default()),
            Err(SerialError::CrcValidation { .. })
        ));

        // sem confirmação o payload passa
        let mut c = comm(&input);
        let options = ReadOptions {
            confirm_crc: false,
            include_crc: false,
        };
        assert_eq!(c.read_config_setting(0x2B, 2, options).unwrap(), [0x12 ^ 0xFF, 0x34]);
    }

    #[test]
    fn config_read_nak_stops_before_payload() {
        let mut c = comm(&[NAK_ALTERNATE, 0xAA, 0xBB, 0xCC]);
        assert!(matches!(
            c.read_config_setting(0x2B, 1, ReadOptions::default()),
            Err(SerialError::NotAcknowledged(0x21))
        ));
        assert_eq!(c.read_data(8).unwrap(), [0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn writes_config_setting() {
        let mut c = comm(&[ACK]);
        c.write_config_setting(0x2B, 1, &[0x10]).unwrap();

        let mut expected = b"EEBWR 2B 01\n".to_vec();
        expected.extend(crc::append_trailer(&[0x10]));
        assert_eq!(sent(&c), expected);
    }

    #[test]
    fn write_length_mismatch_sends_nothing() {
        let mut c = comm(&[ACK]);
        assert!(matches!(
            c.write_config_setting(0x2B, 2, &[0x10]),
            Err(SerialError::LengthMismatch { expected: 2, actual: 1 })
        ));
        assert!(sent(&c).is_empty());
    }

    #[test]
    fn reads_rain_collector_from_setup_bits() {
        let mut input = vec![ACK];
        input.extend(crc::append_trailer(&[0b0001_0101]));

        let mut c = comm(&input);
        let code = c.read_rain_collector_type().unwrap();
        assert_eq!(code, 0x10);
        assert_eq!(
            RainCollectorTypeSerial::try_from(code).unwrap(),
            RainCollectorTypeSerial::Millimeters0_2
        );
        assert_eq!(sent(&c), b"EEBRD 2B 01\n");
    }

    #[test]
    fn with_connection_success() {
        let mut c = SerialCommunicator::new(ScriptedTransport::new(&[ACK]));
        let out = c.with_connection(|c| c.send_instruction("TEST", true).map(|_| 7)).unwrap();
        assert_eq!(out, 7);
        assert!(!c.is_connected());
    }

    #[test]
    fn with_connection_prefers_closure_error() {
        let mut c = SerialCommunicator::new(ScriptedTransport {
            fail_disconnect: true,
            ..ScriptedTransport::new(&[NAK])
        });
        let err = c.with_connection(|c| c.send_instruction("TEST", true)).unwrap_err();
        assert!(matches!(err, SerialError::NotAcknowledged(NAK)));
    }

    #[test]
    fn with_connection_reports_disconnect_error() {
        let mut c = SerialCommunicator::new(ScriptedTransport {
            fail_disconnect: true,
            ..ScriptedTransport::new(&[ACK])
        });
        let err = c.with_connection(|c| c.send_instruction("TEST", true)).unwrap_err();
        assert!(matches!(err, SerialError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn with_connection_skips_closure_on_connect_failure() {
        let mut c = SerialCommunicator::new(ScriptedTransport {
            fail_connect: true,
            ..ScriptedTransport::default()
        });
        let mut ran = false;
        let err = c
            .with_connection(|_| {
                ran = true;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, SerialError::Io(_)));
        assert!(!ran);
    }

    #[test]
    fn tcp_transport_round_trip() {
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let console = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut cmd = [0u8; 5];
            socket.read_exact(&mut cmd).unwrap();
            assert_eq!(&cmd, b"TEST\n");
            socket.write_all(&[ACK]).unwrap();
        });

        let transport = TcpTransport::new("127.0.0.1", port).with_read_timeout(Some(Duration::from_secs(5)));
        let mut c = SerialCommunicator::new(transport);
        c.with_connection(|c| c.send_instruction("TEST", true)).unwrap();
        console.join().unwrap();
    }
}

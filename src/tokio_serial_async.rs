//! Provides an asynchronous client for reading an IEC 61107 meter using Tokio
//! and the `tokio-serial` crate for serial communication.
//!
//! This module is suitable for applications built on the Tokio runtime.
//!
//! # Example
//!
//! ```no_run
//! use nevameter_lib::protocol::Register;
//! use nevameter_lib::tokio_serial_async::{Error, NevaMeter};
//! use std::time::Duration;
//!
//! async fn readout() -> Result<(), Error> {
//!     let mut meter = NevaMeter::new("/dev/ttyUSB0")?;
//!     meter.set_timeout(Duration::from_millis(1500))?;
//!
//!     let identification = meter.connect(b"00000000").await?;
//!     println!("Meter: {:?}", identification);
//!
//!     let energy = meter.read(Register::TotalEnergy).await?;
//!     println!("Total energy: {}", energy);
//!
//!     meter.close().await?;
//!     Ok(())
//! }
//! ```

use crate::protocol::{commands, *};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt};

const MAX_FRAME_LENGTH: usize = 512;

/// Errors specific to the asynchronous Tokio serial port client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A session command was issued before `connect()`.
    #[error("connect() has to be called before")]
    NotConnected,
    /// The meter rejected a command with a negative acknowledge.
    #[error("Meter answered NAK")]
    Rejected,
    /// An error originating from the protocol codec.
    #[error("Protocol error: {0}")]
    ProtocolError(#[from] crate::Error),
    /// An I/O error, typically from the serial port communication.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    /// An error from the `tokio-serial` crate.
    #[error("Tokio serial error: {0}")]
    TokioSerial(#[from] tokio_serial::Error),
    /// An error indicating that a Tokio timeout elapsed during an I/O operation.
    #[error("Tokio timeout elapsed: {0}")]
    TokioElapsed(#[from] tokio::time::error::Elapsed),
}

impl Error {
    /// Failures worth another attempt: corrupted or lost frames. Errors reported
    /// by the meter itself are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ProtocolError(err) => err.is_retryable(),
            Error::IOError(_) | Error::TokioElapsed(_) => true,
            _ => false,
        }
    }
}

/// A specialized `Result` type for operations within the `tokio_serial_async` module.
type Result<T> = std::result::Result<T, Error>;

/// The main struct for reading a meter asynchronously using Tokio.
///
/// A session is opened with [`NevaMeter::connect`] and ended with
/// [`NevaMeter::close`]; all register access happens in between.
#[derive(Debug)]
pub struct NevaMeter {
    serial: tokio_serial::SerialStream,
    last_execution: Instant,
    io_timeout: Duration, // Timeout for individual I/O operations
    delay: Duration,      // Delay between frames
    baudrate_code: u8,    // Highest baud rate to negotiate
    identification: Option<IdentificationMessage>,
    retries: u8,
}

macro_rules! request_with_retry {
    ($self:ident, $request_bytes:expr, $decode:expr) => {{
        let mut attempt: u8 = 0;
        loop {
            let result = match $self.send_and_receive_frame($request_bytes).await {
                Ok(reply_bytes) => $decode(&reply_bytes).map_err(Error::from),
                Err(err) => Err(err),
            };
            match result {
                Err(err) if attempt < $self.retries && err.is_retryable() => {
                    attempt += 1;
                    log::trace!(
                        "Failed try {} of {}, repeating ({err})",
                        attempt,
                        $self.retries
                    );
                }
                result => break result,
            }
        }
    }};
}

impl NevaMeter {
    /// Creates a new `NevaMeter` instance for asynchronous communication.
    ///
    /// The port is opened with 7 data bits, even parity and one stop bit at
    /// the initial rate of 300 baud.
    ///
    /// # Arguments
    ///
    /// * `port`: The path to the serial port device (e.g., `/dev/ttyUSB0` on Linux, `COM3` on Windows).
    pub fn new(port: &str) -> Result<Self> {
        Ok(Self {
            serial: tokio_serial::new(port, INITIAL_BAUDRATE)
                .data_bits(tokio_serial::DataBits::Seven)
                .parity(tokio_serial::Parity::Even)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()?,
            last_execution: Instant::now(),
            delay: MINIMUM_DELAY,
            io_timeout: Duration::from_secs(2),
            baudrate_code: 5,
            identification: None,
            retries: 3,
        })
    }

    /// sets the number of retries for a failed register access
    pub fn set_retry(&mut self, n_retries: u8) {
        self.retries = n_retries;
    }

    /// Asynchronously waits for the configured delay duration since the last frame was received.
    async fn serial_await_delay(&self) {
        let last_exec_diff = Instant::now().duration_since(self.last_execution);
        if let Some(time_until_delay_reached) = self.delay.checked_sub(last_exec_diff) {
            tokio::time::sleep(time_until_delay_reached).await;
        }
    }

    /// Private async helper to send bytes to the serial port.
    /// It handles clearing pending data, awaiting delay, and writing the buffer with timeouts.
    async fn send_bytes(&mut self, tx_buffer: &[u8]) -> Result<()> {
        // A late answer to a previous request must not be taken for the answer to this one.
        loop {
            let pending = self.serial.bytes_to_read()?;
            if pending > 0 {
                log::trace!("got {pending} pending bytes");
                let mut buf: Vec<u8> = vec![0; 64];
                let received =
                    tokio::time::timeout(self.io_timeout, self.serial.read(buf.as_mut_slice()))
                        .await??;
                log::trace!("{received} pending bytes consumed");
            } else {
                break;
            }
        }
        self.serial_await_delay().await;

        log::trace!("write bytes: {tx_buffer:02X?}");
        tokio::time::timeout(self.io_timeout, self.serial.write_all(tx_buffer)).await??;
        Ok(())
    }

    /// Reads single bytes until `complete` accepts the buffer.
    async fn receive_until(&mut self, complete: impl Fn(&[u8]) -> bool) -> Result<Vec<u8>> {
        let mut rx_buffer = Vec::new();
        while !complete(&rx_buffer) {
            if rx_buffer.len() >= MAX_FRAME_LENGTH {
                return Err(crate::Error::MalformedResponse(rx_buffer).into());
            }
            let byte = tokio::time::timeout(self.io_timeout, self.serial.read_u8()).await??;
            rx_buffer.push(byte);
        }

        self.last_execution = Instant::now();

        log::trace!("receive_bytes: {rx_buffer:02X?}");
        Ok(rx_buffer)
    }

    async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        self.receive_until(|rx| rx.len() >= 2 && rx[rx.len() - 2] == ETX)
            .await
    }

    async fn send_and_receive_frame(&mut self, tx_buffer: &[u8]) -> Result<Vec<u8>> {
        self.send_bytes(tx_buffer).await?;
        self.receive_frame().await
    }

    /// Waits for the acknowledge of a password or write command.
    async fn receive_ack(&mut self) -> Result<()> {
        let first = self.receive_until(|rx| !rx.is_empty()).await?;
        match first[0] {
            ACK => Ok(()),
            NAK => Err(Error::Rejected),
            STX => {
                let rest = self.receive_frame().await?;
                let rx_buffer = [first, rest].concat();
                parse_response(&rx_buffer)?;
                Err(crate::Error::MalformedResponse(rx_buffer).into())
            }
            _ => Err(crate::Error::MalformedResponse(first).into()),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.identification.is_none() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Sets the timeout for individual I/O operations (read/write) on the serial port.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        log::trace!("set timeout to {timeout:?}");
        self.io_timeout = timeout;
        Ok(())
    }

    /// Sets the minimum delay between a response and the next request.
    ///
    /// If the provided `delay` is less than `MINIMUM_DELAY` from the `protocol` module,
    /// `MINIMUM_DELAY` will be used.
    pub fn set_delay(&mut self, delay: Duration) {
        if delay < MINIMUM_DELAY {
            log::warn!("delay {delay:?} lower minimum {MINIMUM_DELAY:?}, use minimum");
            self.delay = MINIMUM_DELAY;
        } else {
            self.delay = delay;
        }
        log::trace!("set delay to {:?}", self.delay);
    }

    /// Limits the baud rate negotiated during `connect()`.
    pub fn set_baudrate_code(&mut self, code: u8) -> Result<()> {
        if baudrate(code).is_none() {
            return Err(crate::Error::InvalidArgument(format!(
                "unknown baud rate code {code}"
            ))
            .into());
        }
        self.baudrate_code = code;
        Ok(())
    }

    /// Opens a programming mode session.
    ///
    /// Sends the sign on message, switches to the highest baud rate both sides
    /// support and answers the password request of the meter. The handshake is
    /// not repeated on failure; call `connect()` again after `close()`.
    ///
    /// # Returns
    ///
    /// The identification message of the meter.
    pub async fn connect(&mut self, password: &[u8]) -> Result<IdentificationMessage> {
        log::trace!("connect");
        self.serial.set_baud_rate(INITIAL_BAUDRATE)?;
        self.send_bytes(commands::SIGN_ON).await?;
        let line = self.receive_until(|rx| rx.ends_with(&[CR, LF])).await?;
        let identification = IdentificationMessage::decode(&line)?;
        log::debug!("identification: {identification:?}");

        let code = u8::min(identification.baudrate_code, self.baudrate_code);
        self.send_bytes(&commands::option_select(code)?).await?;
        tokio::time::timeout(self.io_timeout, self.serial.flush()).await??;
        if let Some(rate) = baudrate(code) {
            log::debug!("switching to {rate} baud");
            self.serial.set_baud_rate(rate)?;
        }

        let operand = PasswordMessage::decode(&self.receive_frame().await?)?;
        log::trace!("password operand: {:02X?}", operand.data);

        self.send_bytes(&build_request(Mode::PasswordCompare, "", password)?)
            .await?;
        self.receive_ack().await?;

        self.identification = Some(identification.clone());
        Ok(identification)
    }

    /// Asynchronously reads a well known register and interprets its content.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use nevameter_lib::protocol::Register;
    /// # use nevameter_lib::tokio_serial_async::{Error, NevaMeter};
    /// # async fn run(meter: &mut NevaMeter) -> Result<(), Error> {
    /// let voltage = meter.read(Register::VoltageA).await?;
    /// println!("Voltage phase A: {voltage} V");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn read(&mut self, register: Register) -> Result<Value> {
        log::trace!("read {register}");
        self.ensure_connected()?;
        request_with_retry!(self, register.request(), read_value)
    }

    /// Asynchronously reads the register with the given OBIS code (`HH.HH.HH*HH`).
    pub async fn read_obis(&mut self, obis: &str) -> Result<Value> {
        log::trace!("read {obis}");
        self.ensure_connected()?;
        let request = build_request(Mode::Read, obis, b"")?;
        request_with_retry!(self, &request, read_value)
    }

    /// Asynchronously reads the season schedule or the special days list.
    ///
    /// # Returns
    ///
    /// One tuple of two digit groups per used schedule slot.
    pub async fn read_schedule(&mut self, register: Register) -> Result<Vec<Vec<u8>>> {
        log::trace!("read schedule {register}");
        self.ensure_connected()?;
        if !register.is_schedule() {
            return Err(crate::Error::InvalidArgument(format!(
                "{register} is not a schedule register"
            ))
            .into());
        }
        request_with_retry!(self, register.request(), read_schedule_entries)
    }

    /// Asynchronously reads the tariff schedule with the given number.
    ///
    /// Every entry is `(hour, minute, tariff)`.
    pub async fn read_tariff_schedule(&mut self, number: u8) -> Result<Vec<Vec<u8>>> {
        log::trace!("read tariff schedule {number}");
        self.ensure_connected()?;
        let request = build_request(Mode::Read, &commands::tariff_schedule_obis(number), b"")?;
        request_with_retry!(self, &request, read_schedule_entries)
    }

    /// Asynchronously writes `payload` into the register with the given OBIS code.
    ///
    /// Writes are never repeated.
    pub async fn write(&mut self, obis: &str, payload: &[u8]) -> Result<()> {
        log::trace!("write {obis}");
        self.ensure_connected()?;
        self.send_bytes(&build_request(Mode::Write, obis, payload)?)
            .await?;
        self.receive_ack().await
    }

    /// Ends the session with a break message.
    pub async fn close(&mut self) -> Result<()> {
        log::trace!("close");
        self.send_bytes(commands::END_SESSION).await?;
        tokio::time::timeout(self.io_timeout, self.serial.flush()).await??;
        self.identification = None;
        Ok(())
    }
}

fn read_schedule_entries(rx_buffer: &[u8]) -> std::result::Result<Vec<Vec<u8>>, crate::Error> {
    let message = DataMessage::decode(rx_buffer)?;
    decode_schedule(&message.fields)
}

use crate::protocol::{commands, *};
use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

// longest frame a meter sends is far below this, a runaway line is not
const MAX_FRAME_LENGTH: usize = 512;

#[derive(Debug)]
pub struct NevaMeter {
    serial: Box<dyn serialport::SerialPort>,
    last_execution: Instant,
    delay: Duration,
    baudrate_code: u8,
    identification: Option<IdentificationMessage>,
}

impl NevaMeter {
    pub fn new(port: &str) -> Result<Self> {
        Ok(Self {
            serial: serialport::new(port, INITIAL_BAUDRATE)
                .data_bits(serialport::DataBits::Seven)
                .parity(serialport::Parity::Even)
                .stop_bits(serialport::StopBits::One)
                .flow_control(serialport::FlowControl::None)
                .open()
                .with_context(|| format!("Cannot open serial port '{}'", port))?,
            last_execution: Instant::now(),
            delay: MINIMUM_DELAY,
            baudrate_code: 5,
            identification: None,
        })
    }

    fn serial_await_delay(&self) {
        let last_exec_diff = Instant::now().duration_since(self.last_execution);
        if let Some(time_until_delay_reached) = self.delay.checked_sub(last_exec_diff) {
            std::thread::sleep(time_until_delay_reached);
        }
    }

    fn send_bytes(&mut self, tx_buffer: &[u8]) -> Result<()> {
        // clear all incoming serial to avoid data collision
        loop {
            let pending = self
                .serial
                .bytes_to_read()
                .with_context(|| "Cannot read number of pending bytes")?;
            if pending > 0 {
                log::trace!("Got {} pending bytes", pending);
                let mut buf: Vec<u8> = vec![0; 64];
                let received = self
                    .serial
                    .read(buf.as_mut_slice())
                    .with_context(|| "Cannot read pending bytes")?;
                log::trace!("Read {} pending bytes", received);
            } else {
                break;
            }
        }
        self.serial_await_delay();

        log::trace!("send_bytes: {:02X?}", tx_buffer);
        self.serial
            .write_all(tx_buffer)
            .with_context(|| "Cannot write to serial")?;
        Ok(())
    }

    fn receive_until(&mut self, complete: impl Fn(&[u8]) -> bool) -> Result<Vec<u8>> {
        let mut rx_buffer = Vec::new();
        let mut byte = [0u8; 1];
        while !complete(&rx_buffer) {
            if rx_buffer.len() >= MAX_FRAME_LENGTH {
                bail!("Response exceeds {} bytes: {:02X?}", MAX_FRAME_LENGTH, rx_buffer);
            }
            self.serial
                .read_exact(&mut byte)
                .with_context(|| format!("Cannot receive response, got {:02X?}", rx_buffer))?;
            rx_buffer.push(byte[0]);
        }

        self.last_execution = Instant::now();

        log::trace!("receive_bytes: {:02X?}", rx_buffer);
        Ok(rx_buffer)
    }

    /// Identification message, terminated by CR LF.
    fn receive_line(&mut self) -> Result<Vec<u8>> {
        self.receive_until(|rx| rx.ends_with(&[CR, LF]))
    }

    /// Frame ending with ETX and the block check character.
    fn receive_frame(&mut self) -> Result<Vec<u8>> {
        self.receive_until(|rx| rx.len() >= 2 && rx[rx.len() - 2] == ETX)
    }

    fn receive_ack(&mut self) -> Result<()> {
        let first = self.receive_until(|rx| !rx.is_empty())?;
        match first[0] {
            ACK => Ok(()),
            NAK => bail!("Meter answered NAK"),
            STX => {
                let rest = self.receive_frame()?;
                let rx_buffer = [first, rest].concat();
                parse_response(&rx_buffer)?;
                bail!("Unexpected response {:02X?}", rx_buffer)
            }
            other => bail!("Unexpected response {:02X?}", other),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.serial
            .set_timeout(timeout)
            .map_err(anyhow::Error::from)
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Duration::max(delay, MINIMUM_DELAY);
    }

    /// Highest baud rate code to switch to after the identification.
    pub fn set_baudrate_code(&mut self, code: u8) -> Result<()> {
        if baudrate(code).is_none() {
            bail!("Unknown baud rate code {}", code);
        }
        self.baudrate_code = code;
        Ok(())
    }

    pub fn identification(&self) -> Option<&IdentificationMessage> {
        self.identification.as_ref()
    }

    /// Opens a programming mode session: sign on, baud rate switch and password check.
    pub fn connect(&mut self, password: &[u8]) -> Result<IdentificationMessage> {
        self.serial
            .set_baud_rate(INITIAL_BAUDRATE)
            .with_context(|| "Cannot reset baud rate")?;
        self.send_bytes(commands::SIGN_ON)?;
        let identification = IdentificationMessage::decode(&self.receive_line()?)
            .with_context(|| "Cannot get identification")?;
        log::debug!("Identification: {:?}", identification);

        let code = u8::min(identification.baudrate_code, self.baudrate_code);
        self.send_bytes(&commands::option_select(code)?)?;
        // the option select still goes out at the initial rate
        self.serial
            .flush()
            .with_context(|| "Cannot flush serial connection")?;
        if let Some(rate) = baudrate(code) {
            log::debug!("Switching to {} baud", rate);
            self.serial
                .set_baud_rate(rate)
                .with_context(|| format!("Cannot switch to {} baud", rate))?;
        }

        let operand = PasswordMessage::decode(&self.receive_frame()?)
            .with_context(|| "Cannot get password request")?;
        log::trace!("Password operand: {:02X?}", operand.data);

        self.send_bytes(&build_request(Mode::PasswordCompare, "", password)?)?;
        self.receive_ack()
            .with_context(|| "Password was not accepted")?;

        self.identification = Some(identification.clone());
        Ok(identification)
    }

    fn read_data(&mut self, request: &[u8]) -> Result<DataMessage> {
        self.send_bytes(request)?;
        Ok(DataMessage::decode(&self.receive_frame()?)?)
    }

    pub fn read(&mut self, register: Register) -> Result<Value> {
        let message = self
            .read_data(register.request())
            .with_context(|| format!("Cannot read {}", register))?;
        Ok(Value::from_fields(&message.fields)?)
    }

    pub fn read_obis(&mut self, obis: &str) -> Result<Value> {
        let request = build_request(Mode::Read, obis, b"")?;
        let message = self
            .read_data(&request)
            .with_context(|| format!("Cannot read {}", obis))?;
        Ok(Value::from_fields(&message.fields)?)
    }

    pub fn read_schedule(&mut self, register: Register) -> Result<Vec<Vec<u8>>> {
        if !register.is_schedule() {
            bail!("{} is not a schedule register", register);
        }
        let message = self
            .read_data(register.request())
            .with_context(|| format!("Cannot read {}", register))?;
        Ok(decode_schedule(&message.fields)?)
    }

    pub fn read_tariff_schedule(&mut self, number: u8) -> Result<Vec<Vec<u8>>> {
        let obis = commands::tariff_schedule_obis(number);
        let request = build_request(Mode::Read, &obis, b"")?;
        let message = self
            .read_data(&request)
            .with_context(|| format!("Cannot read tariff schedule {}", number))?;
        Ok(decode_schedule(&message.fields)?)
    }

    pub fn write(&mut self, obis: &str, payload: &[u8]) -> Result<()> {
        self.send_bytes(&build_request(Mode::Write, obis, payload)?)?;
        self.receive_ack()
            .with_context(|| format!("Cannot write {}", obis))
    }

    /// Ends the session; the meter falls back to the initial baud rate.
    pub fn close(&mut self) -> Result<()> {
        self.send_bytes(commands::END_SESSION)?;
        self.serial
            .flush()
            .with_context(|| "Cannot flush serial connection")?;
        self.identification = None;
        Ok(())
    }
}

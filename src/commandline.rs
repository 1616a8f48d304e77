use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use nevameter_lib::protocol::Register;
use std::time::Duration;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ScheduleKind {
    /// Season schedule: day, month and tariff schedule number per entry
    Season,
    /// Special days: day, month and tariff schedule number per entry
    SpecialDays,
    /// Tariff schedule: hour, minute and tariff per entry
    Tariff {
        /// Number of the tariff schedule
        number: u8,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Show the identification message: vendor, baud rate code and meter type
    Identify,
    /// Read a well known register (e.g. total-energy, voltage-a, serial-number)
    Read {
        /// Register name
        register: Register,
    },
    /// Read any register by its OBIS code (e.g. "60.01.00*FF")
    ReadObis {
        /// OBIS code in the form HH.HH.HH*FF
        obis: String,
    },
    /// Show a schedule stored in the meter
    Schedule {
        #[command(subcommand)]
        kind: ScheduleKind,
    },
    /// Write a value into a register (Use with caution!)
    Write {
        /// OBIS code in the form HH.HH.HH*FF
        obis: String,
        /// Raw value as sent inside the parentheses
        payload: String,
    },
    /// Read all well known registers
    All,
    /// Run in daemon mode, periodically reading registers and printing them
    Daemon {
        /// Interval between two readouts (e.g., "10s", "1m")
        #[clap(long, short, value_parser = humantime::parse_duration, default_value = "60s")]
        interval: Duration,
        /// Comma-separated list of registers to read (e.g., total-energy,voltage-a)
        #[clap(
            long,
            short,
            use_value_delimiter = true,
            default_value = "total-energy,active-power-sum"
        )]
        registers: Vec<Register>,
        /// Output format of every readout
        #[arg(long, value_enum, default_value_t = OutputFormat::Debug)]
        format: OutputFormat,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Debug,
    Json,
}

const fn about_text() -> &'static str {
    "IEC 61107 electricity meter command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Timeout for serial I/O operations (e.g., "500ms", "1s", "2s 500ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "1500ms")]
    pub timeout: Duration,

    /// Delay between a response and the next request (at least 20ms)
    #[arg(value_parser = humantime::parse_duration, long, default_value = "50ms")]
    pub delay: Duration,

    /// Meter password
    #[arg(short, long, default_value = "00000000")]
    pub password: String,

    /// Highest baud rate code to negotiate (0=300 ... 5=9600, 6=19200)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub baudrate_code: u8,
}

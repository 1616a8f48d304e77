use anyhow::{bail, Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use nevameter_lib::protocol::Register;
use nevameter_lib::serialport::NevaMeter;
use std::{ops::Deref, panic};

mod commandline;
mod daemon;

use commandline::{CliArgs, CliCommands, ScheduleKind};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn print_schedule(name: &str, entries: &[Vec<u8>]) {
    println!("{name}:");
    for entry in entries {
        println!("  {entry:?}");
    }
}

fn run_command(meter: &mut NevaMeter, command: CliCommands) -> Result<()> {
    match command {
        CliCommands::Identify => {
            if let Some(identification) = meter.identification() {
                println!(
                    "Vendor: {}, baud rate code: {}, identifier: {}",
                    identification.vendor,
                    identification.baudrate_code,
                    identification.identifier
                );
            }
        }
        CliCommands::Read { register } => {
            println!("{}: {}", register, meter.read(register)?);
        }
        CliCommands::ReadObis { obis } => {
            println!("{}: {}", obis, meter.read_obis(&obis)?);
        }
        CliCommands::Schedule { kind } => match kind {
            ScheduleKind::Season => print_schedule(
                "Season schedule",
                &meter.read_schedule(Register::SeasonSchedule)?,
            ),
            ScheduleKind::SpecialDays => print_schedule(
                "Special days",
                &meter.read_schedule(Register::SpecialDays)?,
            ),
            ScheduleKind::Tariff { number } => print_schedule(
                &format!("Tariff schedule {number}"),
                &meter.read_tariff_schedule(number)?,
            ),
        },
        CliCommands::Write { obis, payload } => {
            meter
                .write(&obis, payload.as_bytes())
                .with_context(|| format!("Cannot write {obis}"))?;
            info!("{obis} written");
        }
        CliCommands::All => {
            for register in Register::ALL {
                if register.is_schedule() {
                    print_schedule(register.name(), &meter.read_schedule(register)?);
                } else {
                    println!("{}: {}", register, meter.read(register)?);
                }
            }
        }
        CliCommands::Daemon { .. } => bail!("Daemon mode cannot run inside a session"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let mut meter = NevaMeter::new(&args.device)
        .with_context(|| format!("Cannot open serial port '{}'", args.device))?;
    meter.set_timeout(args.timeout)?;
    meter.set_delay(args.delay);
    meter.set_baudrate_code(args.baudrate_code)?;

    match args.command {
        CliCommands::Daemon {
            interval,
            registers,
            format,
        } => daemon::run(
            meter,
            args.password.as_bytes(),
            interval,
            registers,
            format,
        ),
        command => {
            meter
                .connect(args.password.as_bytes())
                .with_context(|| "Cannot open session")?;
            let result = run_command(&mut meter, command);
            // leave programming mode even if the command failed
            if let Err(e) = meter.close() {
                warn!("Cannot close session: {e:#}");
            }
            result
        }
    }
}

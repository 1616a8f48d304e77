use anyhow::Result;
use log::{error, info};
use nevameter_lib::protocol::{Register, Value};
use nevameter_lib::serialport::NevaMeter;
use serde_json::json;
use std::time::Duration;

use crate::commandline::OutputFormat;

#[derive(Debug)]
enum FetchedData {
    Value(Value),
    Schedule(Vec<Vec<u8>>),
}

impl FetchedData {
    fn fetch(meter: &mut NevaMeter, register: Register) -> Result<Self> {
        if register.is_schedule() {
            Ok(FetchedData::Schedule(meter.read_schedule(register)?))
        } else {
            Ok(FetchedData::Value(meter.read(register)?))
        }
    }

    fn to_json_value(&self) -> Result<serde_json::Value> {
        match self {
            FetchedData::Value(v) => serde_json::to_value(v).map_err(Into::into),
            FetchedData::Schedule(s) => serde_json::to_value(s).map_err(Into::into),
        }
    }

    fn as_debug_string(&self) -> String {
        match self {
            FetchedData::Value(v) => format!("{v}"),
            FetchedData::Schedule(s) => format!("{s:?}"),
        }
    }
}

/// One session per readout; meters drop an idle session after a few seconds.
fn readout(
    meter: &mut NevaMeter,
    password: &[u8],
    registers: &[Register],
) -> Result<Vec<(Register, FetchedData)>> {
    meter.connect(password)?;
    let mut fetched_data = Vec::with_capacity(registers.len());
    for register in registers {
        info!("Fetching register: {register}");
        match FetchedData::fetch(meter, *register) {
            Ok(data) => fetched_data.push((*register, data)),
            Err(e) => error!("Error fetching register '{register}': {e:#}"),
        }
    }
    meter.close()?;
    Ok(fetched_data)
}

fn print_json(fetched_data: &[(Register, FetchedData)]) {
    let mut data_to_print = serde_json::Map::new();
    data_to_print.insert(
        "timestamp".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    for (register, data) in fetched_data {
        match data.to_json_value() {
            Ok(value) => {
                data_to_print.insert(register.to_string(), value);
            }
            Err(e) => error!("Failed to serialize '{register}': {e}"),
        }
    }
    match serde_json::to_string(&data_to_print) {
        Ok(line) => println!("{line}"),
        Err(e) => error!("Failed to serialize data to JSON string: {e}"),
    }
}

pub fn run(
    mut meter: NevaMeter,
    password: &[u8],
    interval: Duration,
    registers: Vec<Register>,
    format: OutputFormat,
) -> Result<()> {
    info!("Starting daemon mode: interval={interval:?}, registers={registers:?}, format={format:?}");

    loop {
        match readout(&mut meter, password, &registers) {
            Ok(fetched_data) => match format {
                OutputFormat::Debug => {
                    println!("--- Data at {} ---", chrono::Local::now().to_rfc3339());
                    for (register, data) in &fetched_data {
                        println!("{}: {}", register, data.as_debug_string());
                    }
                    println!("--------------------------");
                }
                OutputFormat::Json => print_json(&fetched_data),
            },
            Err(e) => error!("Readout failed: {e:#}"),
        }
        std::thread::sleep(interval);
    }
}

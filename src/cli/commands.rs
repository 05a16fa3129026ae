use clap::{Arg, ArgMatches, Command};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, SensorConfig};
use crate::modbus::transport::{available_ports, Transport};
use crate::sensors::factory::parse_address;
use crate::sensors::registry::{series_key, SensorRegistry};
use crate::sensors::SensorFactory;
use crate::services::Collector;
use crate::storage::DataStore;
use crate::utils::error::ModbusError;

pub fn build_cli() -> Command {
    Command::new("envsense_master")
        .version(crate::VERSION)
        .about("Polls Modbus RTU environmental sensors over a shared RS-485 bus")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .global(true),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Serial port, e.g. /dev/ttyUSB0")
                .global(true),
        )
        .arg(
            Arg::new("baud")
                .short('b')
                .long("baud")
                .value_name("RATE")
                .help("Baud rate")
                .global(true),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .value_name("MS")
                .help("Polling interval in milliseconds")
                .global(true),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Per-exchange read timeout in milliseconds")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log filter, overrides RUST_LOG")
                .global(true),
        )
        .subcommand(Command::new("run").about("Collect continuously and serve the HTTP API (default)"))
        .subcommand(
            Command::new("read")
                .about("Read one sensor once and print the result as JSON")
                .arg(
                    Arg::new("type")
                        .short('t')
                        .long("type")
                        .value_name("TYPE")
                        .help("Sensor type: LMT84LP, NSL19M51, SGP30 or DHT22")
                        .required(true),
                )
                .arg(
                    Arg::new("address")
                        .short('a')
                        .long("address")
                        .value_name("ADDR")
                        .help("Slave address, decimal or 0x-prefixed hex")
                        .required(true),
                )
                .arg(
                    Arg::new("channel")
                        .long("channel")
                        .value_name("N")
                        .help("Channel index; all channels when omitted"),
                ),
        )
        .subcommand(Command::new("read-all").about("Run one polling cycle over the configured sensors"))
        .subcommand(Command::new("ports").about("List available serial ports"))
        .subcommand(
            Command::new("init-config")
                .about("Write the default configuration file")
                .arg(Arg::new("path").value_name("PATH").required(true)),
        )
}

#[derive(Debug, Serialize)]
struct ChannelReading {
    channel: usize,
    name: &'static str,
    unit: &'static str,
    value: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OneShotReport {
    sensor_type: String,
    address: u8,
    readings: Vec<ChannelReading>,
}

/// Runs a one-shot subcommand. Returns `Ok(false)` when the caller should
/// start the long-running collector instead.
pub async fn handle_subcommands(matches: &ArgMatches) -> Result<bool, ModbusError> {
    match matches.subcommand() {
        Some(("init-config", sub)) => {
            let path = sub
                .get_one::<String>("path")
                .ok_or_else(|| ModbusError::ConfigError("Missing path".to_string()))?;
            Config::default().save_to_file(path)?;
            println!("✅ Default configuration written to {}", path);
            Ok(true)
        }
        Some(("ports", _)) => {
            let ports = available_ports()?;
            if ports.is_empty() {
                println!("⚠️  No serial ports found");
            }
            for (index, port) in ports.iter().enumerate() {
                println!("{}. {}", index + 1, port);
            }
            Ok(true)
        }
        Some(("read", sub)) => {
            let config = Config::from_matches(matches)?;
            let report = read_once(&config, sub).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }
        Some(("read-all", _)) => {
            let config = Config::from_matches(matches)?;
            let registry = Arc::new(registry_from_config(&config)?);
            let store = Arc::new(DataStore::new());
            let collector = Collector::new(Arc::clone(&registry), Arc::clone(&store), config.poll_interval());

            info!("🔍 Reading {} configured sensors once...", registry.len());
            let failures = collector.run_once(0.0).await;
            if failures > 0 {
                warn!("⚠️  {} reads failed and were reported as 0", failures);
            }
            println!("{}", serde_json::to_string_pretty(&store.dump())?);
            Ok(true)
        }
        _ => Ok(false),
    }
}

async fn read_once(config: &Config, matches: &ArgMatches) -> Result<OneShotReport, ModbusError> {
    let sensor_type = matches
        .get_one::<String>("type")
        .ok_or_else(|| ModbusError::ConfigError("Missing --type".to_string()))?;
    let address_text = matches
        .get_one::<String>("address")
        .ok_or_else(|| ModbusError::ConfigError("Missing --address".to_string()))?;

    let address = parse_address(address_text)?;
    let sensor = SensorFactory::default().create(sensor_type, address)?;
    let channels: Vec<usize> = match matches.get_one::<String>("channel") {
        Some(text) => {
            let channel = text
                .parse()
                .map_err(|_| ModbusError::ConfigError(format!("Invalid value for --channel: {}", text)))?;
            vec![channel]
        }
        None => (0..sensor.channel_count()).collect(),
    };

    let transport = Arc::new(transport_from_config(config));
    let mut readings = Vec::with_capacity(channels.len());
    for channel in channels {
        let spec = sensor.channel_spec(channel)?;
        let started = Instant::now();
        let reading = match sensor.read(&transport, channel).await {
            Ok(value) => {
                info!(
                    "📊 {}@0x{:02X} {} = {} {} ({} ms)",
                    sensor_type,
                    address,
                    spec.name,
                    value,
                    spec.unit,
                    started.elapsed().as_millis()
                );
                ChannelReading {
                    channel,
                    name: spec.name,
                    unit: spec.unit,
                    value: Some(value),
                    error: None,
                }
            }
            Err(e) => {
                warn!("⚠️  {}@0x{:02X} {} failed: {}", sensor_type, address, spec.name, e);
                ChannelReading {
                    channel,
                    name: spec.name,
                    unit: spec.unit,
                    value: None,
                    error: Some(e.to_string()),
                }
            }
        };
        readings.push(reading);
    }

    Ok(OneShotReport {
        sensor_type: sensor.sensor_type().to_string(),
        address,
        readings,
    })
}

pub fn transport_from_config(config: &Config) -> Transport {
    Transport::new(&config.serial_port, config.baud_rate, config.timeout())
}

pub fn registry_from_config(config: &Config) -> Result<SensorRegistry, ModbusError> {
    let registry = SensorRegistry::new(Arc::new(transport_from_config(config)));
    register_configured_sensors(&registry, &config.sensors)?;
    Ok(registry)
}

/// Registers every configured sensor; the first invalid entry aborts.
pub fn register_configured_sensors(registry: &SensorRegistry, sensors: &[SensorConfig]) -> Result<(), ModbusError> {
    for sensor in sensors {
        let metadata = registry.add_sensor(&sensor.sensor_type, &sensor.name, &sensor.address)?;
        let keys: Vec<String> = (0..metadata.channel_count)
            .map(|channel| series_key(&metadata.name, channel, metadata.channel_count))
            .collect();
        info!("🔧 Configured sensor '{}' -> series [{}]", metadata.name, keys.join(", "));
    }
    Ok(())
}

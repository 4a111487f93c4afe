//! Operator tool for the glue cell.
//!
//! Subcommands:
//! - `fan`, `motor`, `generator`, `vacuum`: drive the actuation bus directly
//! - `read-registers`: dump holding registers
//! - `show-calibration`: print the stored calibration artifacts
//! - `transform`: map camera pixels to robot millimetres (or back)

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use calibration::CalibrationStore;
use cell_service::CellSettings;
use clap::{Parser, Subcommand};
use hardware::{ActuatorSet, HardwareConfig};
use nalgebra::Point2;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "glue_cell")]
#[command(about = "Glue cell bench and calibration tool")]
#[command(version)]
struct Args {
    /// Cell settings JSON (hardware defaults are used when omitted)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Override the serial port from the settings
    #[arg(long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set fan speed in percent (0 = off)
    Fan {
        #[arg(default_value = "100")]
        speed: u16,
    },

    /// Run a glue pump channel for a while, then stop with a reverse pulse
    Motor {
        /// Pump channel
        #[arg(short, long, default_value = "0")]
        channel: u8,

        #[arg(short, long, default_value = "500")]
        speed: u16,

        /// Run time in milliseconds before stopping
        #[arg(long, default_value = "1000")]
        run_ms: u64,

        #[arg(long, default_value = "300")]
        reverse_speed: u16,

        #[arg(long, default_value = "200")]
        reverse_ms: u64,
    },

    /// Switch the generator on for a while, then off
    Generator {
        #[arg(long, default_value = "5")]
        hold_s: u64,
    },

    /// Switch the vacuum pump
    Vacuum {
        #[arg(long)]
        off: bool,
    },

    /// Read holding registers
    ReadRegisters {
        #[arg(short, long, default_value = "0")]
        address: u16,

        #[arg(short = 'n', long, default_value = "8")]
        count: u16,
    },

    /// Print the stored calibration artifacts
    ShowCalibration {
        /// Calibration directory (overrides the settings)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Map a camera pixel to robot millimetres
    Transform {
        x: f64,
        y: f64,

        /// Map robot millimetres back to camera pixels
        #[arg(long)]
        inverse: bool,

        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn load_settings(args: &Args) -> Result<Option<CellSettings>> {
    args.settings
        .as_ref()
        .map(|path| {
            CellSettings::load(path)
                .with_context(|| format!("loading settings {}", path.display()))
        })
        .transpose()
}

fn hardware_config(args: &Args, settings: Option<&CellSettings>) -> Result<HardwareConfig> {
    let mut config = settings
        .map(|s| s.hardware.clone())
        .unwrap_or_default();
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    config.validate()?;
    Ok(config)
}

fn calibration_store(
    dir: Option<PathBuf>,
    settings: Option<&CellSettings>,
) -> Result<CalibrationStore> {
    match (dir, settings) {
        (Some(dir), _) => Ok(CalibrationStore::with_path(dir)),
        (None, Some(s)) => Ok(CalibrationStore::with_path(&s.storage.calibration_dir)),
        (None, None) => bail!("pass --dir or --settings to locate the calibration"),
    }
}

fn open_bus(args: &Args, settings: Option<&CellSettings>) -> Result<ActuatorSet> {
    let config = hardware_config(args, settings)?;
    info!(
        "Opening {} at {} baud (slave {})",
        config.serial.port, config.serial.baud_rate, config.slave_id
    );
    ActuatorSet::open(&config).context("opening actuation bus")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    match &args.command {
        Command::Fan { speed } => {
            let actuators = open_bus(&args, settings.as_ref())?;
            if *speed == 0 {
                actuators.fan.off()?;
            } else {
                actuators.fan.on(*speed)?;
            }
        }
        Command::Motor {
            channel,
            speed,
            run_ms,
            reverse_speed,
            reverse_ms,
        } => {
            let actuators = open_bus(&args, settings.as_ref())?;
            actuators.motor.on(*channel, *speed)?;
            thread::sleep(Duration::from_millis(*run_ms));
            actuators
                .motor
                .off(*channel, *reverse_speed, Duration::from_millis(*reverse_ms))?;
        }
        Command::Generator { hold_s } => {
            let actuators = open_bus(&args, settings.as_ref())?;
            actuators.generator.turn_on()?;
            thread::sleep(Duration::from_secs(*hold_s));
            actuators.generator.turn_off()?;
            info!(
                "Generator on-time this run: {:.1}s",
                actuators.generator.usage().total().as_secs_f64()
            );
        }
        Command::Vacuum { off } => {
            let actuators = open_bus(&args, settings.as_ref())?;
            if *off {
                actuators.vacuum.off()?;
            } else {
                actuators.vacuum.on()?;
            }
        }
        Command::ReadRegisters { address, count } => {
            let actuators = open_bus(&args, settings.as_ref())?;
            let values = actuators.bus().read_holding_registers(*address, *count)?;
            for (i, v) in values.iter().enumerate() {
                println!("{:5}: {v:5} (0x{v:04X})", *address as usize + i);
            }
        }
        Command::ShowCalibration { dir } => {
            let store = calibration_store(dir.clone(), settings.as_ref())?;
            let artifacts = store.load_all().context("loading calibration")?;
            println!("Calibration directory: {}", store.root_path().display());
            match &artifacts.intrinsics {
                Some(k) => {
                    println!("Camera matrix:");
                    for row in &k.camera_matrix {
                        println!("  {:12.4} {:12.4} {:12.4}", row[0], row[1], row[2]);
                    }
                    println!("Distortion: {:?}", k.distortion);
                    println!("Intrinsics RMS: {:.4} px", k.rms_error);
                }
                None => println!("Camera intrinsics: missing"),
            }
            for (name, h) in [
                ("Perspective", &artifacts.perspective),
                ("Camera to robot", &artifacts.camera_to_robot),
            ] {
                match h {
                    Some(h) => println!("{name}:{}", h.matrix()),
                    None => println!("{name}: missing"),
                }
            }
            if !artifacts.is_complete() {
                println!("Cell is NOT calibrated");
            }
        }
        Command::Transform { x, y, inverse, dir } => {
            let store = calibration_store(dir.clone(), settings.as_ref())?;
            let homography = match store.get_camera_to_robot() {
                Some(result) => result.context("loading camera-to-robot homography")?.value,
                None => bail!("no camera-to-robot homography in {}", store.root_path().display()),
            };
            let p = Point2::new(*x, *y);
            if *inverse {
                let px = homography.inverse().apply_point(p);
                println!("({x:.3}, {y:.3}) mm -> ({:.2}, {:.2}) px", px.x, px.y);
            } else {
                let mm = homography.apply_point(p);
                println!("({x:.2}, {y:.2}) px -> ({:.3}, {:.3}) mm", mm.x, mm.y);
            }
        }
    }

    Ok(())
}

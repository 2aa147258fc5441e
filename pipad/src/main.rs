mod config;
mod app;

use std::env::var;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, info};
use pipad_gpio::{GpioDriver, GpioPin, GpioResult};
use pipad_gpio::gpiod::GpiodDriver;
use pipad_gpio::keypad::{Keymap, MatrixKeypad};
use pipad_gpio::raw::RawGpioDriver;
use pipad_gpio::soft::SoftGpioDriver;
use sysinfo::System;
use crate::app::App;
use crate::config::Config;

fn parse_pins(pin_str: &str) -> eyre::Result<Vec<usize>> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?;
    if pins.is_empty() {
        return Err(eyre::eyre!("No pins given"));
    }
    Ok(pins)
}

/// Opens the GPIO backend selected by the `PIPAD_GPIO_BACKEND` env
/// variable. Defaults to `/dev/gpiomem`.
fn open_gpio() -> eyre::Result<Box<dyn GpioDriver>> {
    let backend = var("PIPAD_GPIO_BACKEND").unwrap_or_else(|_| "gpiomem".to_string());
    Ok(match backend.as_str() {
        "gpiomem" => Box::new(RawGpioDriver::new_gpiomem()?),
        "mem" => Box::new(RawGpioDriver::new_mem()?),
        "gpiod" => {
            let chip = var("PIPAD_GPIOD_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
            Box::new(GpiodDriver::open(chip)?)
        }
        "soft" => Box::new(SoftGpioDriver::new(RawGpioDriver::PIN_COUNT)),
        _ => return Err(eyre::eyre!("Unknown GPIO backend {:?}", backend)),
    })
}

fn claim_pins<'a>(
    gpio: &'a dyn GpioDriver,
    pin_nos: &[usize],
) -> GpioResult<Vec<Box<dyn GpioPin + 'a>>> {
    pin_nos.iter().map(|&pin_no| gpio.get_pin(pin_no)).collect()
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("PiPad starting...");

    const UNKNOWN_STR: &str = "???";

    info!(
        "Running on {}, kernel {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}, architecture {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    // Get pin numbers from env
    let row_pin_nos = parse_pins(&var("PIPAD_PINS_ROWS")?)?;
    let col_pin_nos = parse_pins(&var("PIPAD_PINS_COLS")?)?;

    info!("Keypad @ Rows: {:?}, Cols: {:?}", row_pin_nos, col_pin_nos);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    debug!("Initializing GPIO driver...");
    let gpio = open_gpio()?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing keypad...");
    let row_pins = claim_pins(&*gpio, &row_pin_nos)?;
    let col_pins = claim_pins(&*gpio, &col_pin_nos)?;

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let keymap = Keymap::new(config.keymap)?;
    let mut keypad = MatrixKeypad::new(row_pins, col_pins, keymap)?;

    debug!("{:?} initialized.", keypad);

    info!("PiPad initialized.");

    info!("Starting main loop...");

    let mut app = App::new(&mut keypad);

    loop {
        app.update()?;
        thread::sleep(poll_interval);
    }
}

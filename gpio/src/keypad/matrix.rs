use std::fmt::{Debug, Formatter};
use std::thread;
use std::time::Duration;
use log::trace;
use crate::{GpioBias, GpioDirection, GpioPin, GpioResult};
use crate::keypad::{Keymap, Keypad, KeypadError};

/// Electrical role a scanned pin is currently playing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinRole {
    /// High-impedance input with no bias. The idle role.
    FloatingInput,
    /// Input with the internal pull-up engaged. Reads high unless something
    /// externally pulls the line low.
    PulledUpInput,
    /// Output actively driving the line to the given level.
    DrivenOutput(bool),
}

/// A pin together with the role it is known to be in.
#[derive(Debug)]
pub struct ScanPin<'a> {
    pin: Box<dyn GpioPin + 'a>,
    role: PinRole,
}

impl<'a> ScanPin<'a> {
    /// Wraps a freshly claimed pin, which drivers hand out as a floating
    /// input.
    pub fn new(pin: Box<dyn GpioPin + 'a>) -> Self {
        ScanPin {
            pin,
            role: PinRole::FloatingInput,
        }
    }

    pub fn role(&self) -> PinRole {
        self.role
    }

    /// Makes the pin an input with the pull-up engaged, and pre-sets the
    /// output latch high so a later switch to output starts at the high
    /// level.
    pub fn configure_pulled_up_input(&mut self) -> GpioResult<()> {
        self.pin.set_direction(GpioDirection::Input)?;
        self.pin.set_bias(GpioBias::PullUp)?;
        self.pin.write(true)?;
        self.role = PinRole::PulledUpInput;
        Ok(())
    }

    /// Reads the pin's current level.
    ///
    /// While the pin is driving the line itself, the driven level is
    /// returned without consulting the hardware.
    pub fn read_level(&self) -> GpioResult<bool> {
        match self.role {
            PinRole::DrivenOutput(level) => Ok(level),
            _ => self.pin.read(),
        }
    }

    /// Makes the pin an output and drives the line low.
    pub fn begin_drive_low(&mut self) -> GpioResult<()> {
        self.pin.set_direction(GpioDirection::Output)?;
        self.pin.write(false)?;
        self.role = PinRole::DrivenOutput(false);
        Ok(())
    }

    /// Stops driving the line and returns the pin to a floating input.
    ///
    /// The latch is raised high while the pin is still an output, so the
    /// line never floats at an actively driven low level.
    pub fn end_drive_low(&mut self) -> GpioResult<()> {
        self.pin.write(true)?;
        self.pin.set_direction(GpioDirection::Input)?;
        self.pin.set_bias(GpioBias::None)?;
        self.role = PinRole::FloatingInput;
        Ok(())
    }
}

/// A keypad wired as a row/column matrix, scanned one column at a time.
///
/// Every scan re-arms all row pins as pulled-up inputs, then walks the
/// columns in order. The scanned column is driven low, each row is read in
/// order, and a row reading low means the key at that position is closed.
/// Keys are therefore reported in column-major order.
///
/// The matrix is assumed to have no per-key diodes. Three closed keys
/// forming an L shape short a fourth, unpressed position into the scan,
/// and it is reported as pressed too.
pub struct MatrixKeypad<'a, K> {
    rows: Vec<ScanPin<'a>>,
    cols: Vec<ScanPin<'a>>,
    keymap: Keymap<K>,
    settle_time: Duration,
}

impl<'a, K> MatrixKeypad<'a, K> {
    /// Creates a matrix keypad from its row pins, column pins and keymap.
    ///
    /// The keymap must have exactly one label per row/column pin pair. No
    /// pin is touched until the first scan.
    pub fn new(
        row_pins: Vec<Box<dyn GpioPin + 'a>>,
        col_pins: Vec<Box<dyn GpioPin + 'a>>,
        keymap: Keymap<K>,
    ) -> Result<Self, KeypadError> {
        if keymap.rows() != row_pins.len() || keymap.cols() != col_pins.len() {
            return Err(KeypadError::DimensionMismatch {
                map_rows: keymap.rows(),
                map_cols: keymap.cols(),
                row_pins: row_pins.len(),
                col_pins: col_pins.len(),
            });
        }

        Ok(MatrixKeypad {
            rows: row_pins.into_iter().map(ScanPin::new).collect(),
            cols: col_pins.into_iter().map(ScanPin::new).collect(),
            keymap,
            settle_time: Duration::from_micros(10),
        })
    }

    /// Sets how long to wait after driving a column before reading the rows.
    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }
}

impl<K> Debug for MatrixKeypad<'_, K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MatrixKeypad({}x{})",
            self.rows.len(),
            self.cols.len()
        )
    }
}

impl<K: Clone + Debug> Keypad for MatrixKeypad<'_, K> {
    type Key = K;

    fn scan(&mut self) -> GpioResult<Vec<K>> {
        for row in &mut self.rows {
            row.configure_pulled_up_input()?;
        }

        let mut pressed = Vec::new();

        for (col, col_pin) in self.cols.iter_mut().enumerate() {
            col_pin.begin_drive_low()?;
            if !self.settle_time.is_zero() {
                thread::sleep(self.settle_time);
            }

            for (row, row_pin) in self.rows.iter().enumerate() {
                if !row_pin.read_level()? {
                    let key = self.keymap.label(row, col).clone();
                    trace!("Key down at ({row}, {col}): {key:?}");
                    pressed.push(key);
                }
            }

            col_pin.end_drive_low()?;
        }

        Ok(pressed)
    }
}

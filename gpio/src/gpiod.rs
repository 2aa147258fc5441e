//! GpiodDriver implementation for managing GPIO pins using the gpiod library.
//!
//! Works on any Linux GPIO character device, at the price of a line
//! re-request whenever a pin changes direction or bias.
use crate::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
        }
    }

    /// Opens the GPIO character device at the given path, e.g.
    /// `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path.as_ref())?))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        debug!("Using GPIO line {} on {}", index, self.chip.name());

        let mut pin = GpiodPin {
            driver: self,
            pin_index: index,
            bias: GpioBias::None,
            latch: false,
            line: None,
        };
        pin.reacquire(GpioDirection::Input)?;

        Ok(Box::new(pin))
    }
}

enum GpiodLine {
    Input(gpiod::Lines<gpiod::Input>),
    Output(gpiod::Lines<gpiod::Output>),
}

struct GpiodPin<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    bias: GpioBias,
    latch: bool,
    /// Current line request. `None` only transiently, while switching, or
    /// after a failed request.
    line: Option<GpiodLine>,
}

impl GpiodPin<'_> {
    /// Releases the current request and requests the line again with the
    /// given direction and the stored bias. The kernel refuses a second
    /// request while the first is held, so the old one is dropped first.
    fn reacquire(&mut self, direction: GpioDirection) -> GpioResult<()> {
        self.line = None;

        let line = match direction {
            GpioDirection::Input => {
                let line = self.driver.chip.request_lines(
                    gpiod::Options::input([self.pin_index as u32])
                        .consumer(env!("CARGO_PKG_NAME"))
                        .bias(self.bias.into()),
                )?;
                GpiodLine::Input(line)
            }
            GpioDirection::Output => {
                let line = self.driver.chip.request_lines(
                    gpiod::Options::output([self.pin_index as u32])
                        .consumer(env!("CARGO_PKG_NAME"))
                        .bias(self.bias.into()),
                )?;
                line.set_values([self.latch])?;
                GpiodLine::Output(line)
            }
        };

        self.line = Some(line);
        Ok(())
    }

    fn direction(&self) -> Option<GpioDirection> {
        match self.line {
            Some(GpiodLine::Input(_)) => Some(GpioDirection::Input),
            Some(GpiodLine::Output(_)) => Some(GpioDirection::Output),
            None => None,
        }
    }
}

impl Debug for GpiodPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for GpiodPin<'_> {
    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
        if self.direction() == Some(direction) {
            return Ok(());
        }
        self.reacquire(direction)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        if self.bias == bias {
            return Ok(());
        }
        self.bias = bias;
        // Bias only takes effect on request, so the line is re-requested in
        // its current direction.
        match self.direction() {
            Some(direction) => self.reacquire(direction),
            None => Ok(()),
        }
    }

    fn write(&mut self, level: bool) -> GpioResult<()> {
        self.latch = level;
        if let Some(GpiodLine::Output(line)) = &self.line {
            line.set_values([level])?;
        }
        // While the pin is an input only the latch is updated; the value is
        // applied on the next switch to output.
        Ok(())
    }

    fn read(&self) -> GpioResult<bool> {
        match &self.line {
            Some(GpiodLine::Input(line)) => {
                let values = line.get_values([false])?;
                Ok(values[0])
            }
            Some(GpiodLine::Output(_)) => Ok(self.latch),
            None => Err(GpioError::Other("line is not requested".to_string())),
        }
    }
}

impl Drop for GpiodPin<'_> {
    fn drop(&mut self) {
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_chip_fails() {
        let result = GpiodDriver::open("/does/not/exist");

        assert_eq!(
            result.err(),
            Some(GpioError::Io(std::io::ErrorKind::NotFound))
        );
    }

    #[test]
    fn open_accepts_owned_paths() {
        let path = std::path::PathBuf::from("/does/not/exist");

        assert!(GpiodDriver::open(path).is_err());
    }
}

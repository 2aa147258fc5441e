//! Software-simulated GPIO backend.
//!
//! Keeps per-line electrical state in memory and resolves read levels across
//! "shorts": pairs of lines wired together, which is what a pressed key on a
//! matrix keypad is. Lets the keypad logic run and be tested without any
//! hardware attached.

use crate::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

/// Electrical state of one simulated line.
#[derive(Copy, Clone, Debug, Default)]
struct SoftLine {
    direction: GpioDirection,
    bias: GpioBias,
    latch: bool,
}

/// One recorded pin operation, for tests that assert call ordering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SoftOp {
    SetDirection(usize, GpioDirection),
    SetBias(usize, GpioBias),
    Write(usize, bool),
}

pub struct SoftGpioDriver {
    lines: RefCell<Vec<SoftLine>>,
    shorts: RefCell<Vec<(usize, usize)>>,
    journal: RefCell<Vec<SoftOp>>,
    record_ops: Cell<bool>,
    used_pins: BitVec<AtomicU8>,
}

impl SoftGpioDriver {
    pub fn new(count: usize) -> Self {
        Self {
            lines: RefCell::new(vec![SoftLine::default(); count]),
            shorts: RefCell::new(Vec::new()),
            journal: RefCell::new(Vec::new()),
            record_ops: Cell::new(false),
            used_pins: BitVec::repeat(false, count),
        }
    }

    /// Wires two lines together, as a pressed key on a matrix does.
    pub fn short(&self, a: usize, b: usize) -> GpioResult<()> {
        let pair = self.pair(a, b)?;
        let mut shorts = self.shorts.borrow_mut();
        if !shorts.contains(&pair) {
            shorts.push(pair);
        }
        Ok(())
    }

    /// Removes the wire between two lines.
    pub fn release(&self, a: usize, b: usize) -> GpioResult<()> {
        let pair = self.pair(a, b)?;
        self.shorts.borrow_mut().retain(|&p| p != pair);
        Ok(())
    }

    /// Removes all wires.
    pub fn release_all(&self) {
        self.shorts.borrow_mut().clear();
    }

    /// Enables or disables recording of pin operations into the journal.
    pub fn record_ops(&self, enabled: bool) {
        self.record_ops.set(enabled);
    }

    /// Takes all recorded pin operations, oldest first, clearing the journal.
    pub fn take_journal(&self) -> Vec<SoftOp> {
        std::mem::take(&mut *self.journal.borrow_mut())
    }

    fn pair(&self, a: usize, b: usize) -> GpioResult<(usize, usize)> {
        let count = self.lines.borrow().len();
        if a >= count || b >= count {
            return Err(GpioError::InvalidArgument);
        }
        Ok(if a <= b { (a, b) } else { (b, a) })
    }

    fn record(&self, op: SoftOp) {
        if self.record_ops.get() {
            self.journal.borrow_mut().push(op);
        }
    }

    /// Resolves the level of a line across everything shorted to it.
    ///
    /// An actively driven low wins over a driven high (wired-AND under
    /// contention), any driven level wins over a pull resistor, and a fully
    /// floating net deterministically reads low.
    fn resolve(&self, index: usize) -> bool {
        let lines = self.lines.borrow();
        let shorts = self.shorts.borrow();

        let mut component = vec![index];
        let mut frontier = vec![index];
        while let Some(line) = frontier.pop() {
            for &(a, b) in shorts.iter() {
                let other = match line {
                    l if l == a => b,
                    l if l == b => a,
                    _ => continue,
                };
                if !component.contains(&other) {
                    component.push(other);
                    frontier.push(other);
                }
            }
        }

        let mut driven_low = false;
        let mut driven_high = false;
        let mut pulled_up = false;
        let mut pulled_down = false;
        for &line in &component {
            let state = lines[line];
            if state.direction == GpioDirection::Output {
                if state.latch {
                    driven_high = true;
                } else {
                    driven_low = true;
                }
            }
            match state.bias {
                GpioBias::PullUp => pulled_up = true,
                GpioBias::PullDown => pulled_down = true,
                GpioBias::None => {}
            }
        }

        if driven_low {
            false
        } else if driven_high {
            true
        } else if pulled_up {
            true
        } else if pulled_down {
            false
        } else {
            false
        }
    }
}

impl Debug for SoftGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftGpioDriver({} lines)", self.lines.borrow().len())
    }
}

impl GpioDriver for SoftGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.lines.borrow().len())
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);
        self.lines.borrow_mut()[index] = SoftLine::default();

        Ok(Box::new(SoftGpioPin {
            driver: self,
            pin_index: index,
        }))
    }
}

struct SoftGpioPin<'a> {
    driver: &'a SoftGpioDriver,
    pin_index: usize,
}

impl Debug for SoftGpioPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for SoftGpioPin<'_> {
    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
        self.driver.lines.borrow_mut()[self.pin_index].direction = direction;
        self.driver.record(SoftOp::SetDirection(self.pin_index, direction));
        Ok(())
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.driver.lines.borrow_mut()[self.pin_index].bias = bias;
        self.driver.record(SoftOp::SetBias(self.pin_index, bias));
        Ok(())
    }

    fn write(&mut self, level: bool) -> GpioResult<()> {
        self.driver.lines.borrow_mut()[self.pin_index].latch = level;
        self.driver.record(SoftOp::Write(self.pin_index, level));
        Ok(())
    }

    fn read(&self) -> GpioResult<bool> {
        Ok(self.driver.resolve(self.pin_index))
    }
}

impl Drop for SoftGpioPin<'_> {
    fn drop(&mut self) {
        self.driver.lines.borrow_mut()[self.pin_index].direction = GpioDirection::Input;
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floating_line_reads_low() {
        let driver = SoftGpioDriver::new(4);
        let pin = driver.get_pin(0).unwrap();
        assert_eq!(pin.read(), Ok(false));
    }

    #[test]
    fn pull_up_reads_high() {
        let driver = SoftGpioDriver::new(4);
        let mut pin = driver.get_pin(0).unwrap();
        pin.set_bias(GpioBias::PullUp).unwrap();
        assert_eq!(pin.read(), Ok(true));
    }

    #[test]
    fn driven_low_wins_over_pull_up() {
        let driver = SoftGpioDriver::new(4);
        let mut sensor = driver.get_pin(0).unwrap();
        sensor.set_bias(GpioBias::PullUp).unwrap();
        let mut source = driver.get_pin(1).unwrap();
        source.set_direction(GpioDirection::Output).unwrap();
        source.write(false).unwrap();

        assert_eq!(sensor.read(), Ok(true));
        driver.short(0, 1).unwrap();
        assert_eq!(sensor.read(), Ok(false));
        driver.release(0, 1).unwrap();
        assert_eq!(sensor.read(), Ok(true));
    }

    #[test]
    fn shorts_are_transitive() {
        let driver = SoftGpioDriver::new(4);
        let mut sensor = driver.get_pin(0).unwrap();
        sensor.set_bias(GpioBias::PullUp).unwrap();
        let mut source = driver.get_pin(2).unwrap();
        source.set_direction(GpioDirection::Output).unwrap();
        source.write(false).unwrap();

        driver.short(0, 1).unwrap();
        driver.short(1, 2).unwrap();
        assert_eq!(sensor.read(), Ok(false));
    }

    #[test]
    fn driven_low_wins_over_driven_high() {
        let driver = SoftGpioDriver::new(4);
        let mut high = driver.get_pin(0).unwrap();
        high.set_direction(GpioDirection::Output).unwrap();
        high.write(true).unwrap();
        let mut low = driver.get_pin(1).unwrap();
        low.set_direction(GpioDirection::Output).unwrap();
        low.write(false).unwrap();

        driver.short(0, 1).unwrap();
        assert_eq!(high.read(), Ok(false));
        assert_eq!(low.read(), Ok(false));
    }

    #[test]
    fn latch_applies_once_pin_becomes_output() {
        let driver = SoftGpioDriver::new(4);
        let mut pin = driver.get_pin(0).unwrap();
        pin.write(true).unwrap();
        assert_eq!(pin.read(), Ok(false));
        pin.set_direction(GpioDirection::Output).unwrap();
        assert_eq!(pin.read(), Ok(true));
    }

    #[test]
    fn double_claim_is_rejected() {
        let driver = SoftGpioDriver::new(4);
        let _pin = driver.get_pin(0).unwrap();
        assert_eq!(driver.get_pin(0).err(), Some(GpioError::AlreadyInUse));
    }

    #[test]
    fn claim_is_released_on_drop() {
        let driver = SoftGpioDriver::new(4);
        drop(driver.get_pin(0).unwrap());
        assert!(driver.get_pin(0).is_ok());
    }

    #[test]
    fn out_of_range_is_rejected() {
        let driver = SoftGpioDriver::new(4);
        assert_eq!(driver.get_pin(4).err(), Some(GpioError::InvalidArgument));
        assert_eq!(driver.short(0, 4).err(), Some(GpioError::InvalidArgument));
    }

    #[test]
    fn journal_records_pin_operations() {
        let driver = SoftGpioDriver::new(4);
        let mut pin = driver.get_pin(3).unwrap();
        driver.record_ops(true);
        pin.set_direction(GpioDirection::Output).unwrap();
        pin.write(false).unwrap();
        pin.set_bias(GpioBias::PullDown).unwrap();

        assert_eq!(
            driver.take_journal(),
            vec![
                SoftOp::SetDirection(3, GpioDirection::Output),
                SoftOp::Write(3, false),
                SoftOp::SetBias(3, GpioBias::PullDown),
            ]
        );
        assert!(driver.take_journal().is_empty());
    }
}

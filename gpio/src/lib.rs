pub mod gpiod;
pub mod keypad;
pub mod raw;
pub mod soft;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Specifies the function of a GPIO pin.
///
/// By default pins are inputs; drivers hand claimed pins out that way.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDirection {
    #[default] Input,
    Output,
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index.
    ///
    /// The pin is reserved for the returned handle until that handle is
    /// dropped, and is handed out reset to a floating input with the output
    /// latch low.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the pin is already claimed.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;
}

/// A single claimed GPIO line whose function can be changed at runtime.
pub trait GpioPin: Debug {
    /// Sets the pin function to input (sensing) or output (driving).
    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()>;

    /// Sets the internal pull resistor for the pin.
    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()>;

    /// Sets the output latch of the pin.
    ///
    /// The line is actively driven to the latched level only while the pin
    /// is an output. Writing while the pin is an input pre-sets the latch,
    /// which some platforms use to kick a freshly enabled pull resistor to
    /// its idle level.
    fn write(&mut self, level: bool) -> GpioResult<()>;

    /// Reads the logical level of the line (true = high).
    fn read(&self) -> GpioResult<bool>;
}

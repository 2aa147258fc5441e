mod matrix;

use std::fmt::Debug;
use crate::GpioResult;
use thiserror::Error;
pub use matrix::*;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Performs one full pass over the keypad and returns the keys that are
    /// currently held down.
    fn scan(&mut self) -> GpioResult<Vec<Self::Key>>;
}

/// Errors in the description of a keypad's wiring and labels.
///
/// These are reported when a keypad is constructed, before any pin is
/// touched.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum KeypadError {
    /// A keymap row has a different number of labels than the first row.
    #[error("keymap row {row} has {got} labels, expected {expected}")]
    RaggedKeymap {
        row: usize,
        expected: usize,
        got: usize,
    },
    /// The keymap dimensions do not match the number of pins.
    #[error(
        "keymap is {map_rows}x{map_cols} but {row_pins} row pins and {col_pins} column pins were given"
    )]
    DimensionMismatch {
        map_rows: usize,
        map_cols: usize,
        row_pins: usize,
        col_pins: usize,
    },
}

/// Maps matrix positions to key labels.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Keymap<K> {
    labels: Vec<Vec<K>>,
}

impl<K> Keymap<K> {
    /// Creates a keymap from rows of labels.
    ///
    /// Every row must have the same number of labels.
    pub fn new(labels: Vec<Vec<K>>) -> Result<Self, KeypadError> {
        let expected = labels.first().map_or(0, |row| row.len());
        for (row, row_labels) in labels.iter().enumerate() {
            if row_labels.len() != expected {
                return Err(KeypadError::RaggedKeymap {
                    row,
                    expected,
                    got: row_labels.len(),
                });
            }
        }
        Ok(Keymap { labels })
    }

    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    pub fn cols(&self) -> usize {
        self.labels.first().map_or(0, |row| row.len())
    }

    pub fn label(&self, row: usize, col: usize) -> &K {
        &self.labels[row][col]
    }
}

impl Keymap<char> {
    /// The label layout of a common 16-key telephone-style keypad.
    pub fn standard_4x4() -> Self {
        Keymap {
            labels: vec![
                vec!['1', '2', '3', 'A'],
                vec!['4', '5', '6', 'B'],
                vec!['7', '8', '9', 'C'],
                vec!['*', '0', '#', 'D'],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_4x4_layout() {
        let keymap = Keymap::standard_4x4();
        assert_eq!(keymap.rows(), 4);
        assert_eq!(keymap.cols(), 4);
        assert_eq!(*keymap.label(0, 0), '1');
        assert_eq!(*keymap.label(1, 2), '6');
        assert_eq!(*keymap.label(3, 0), '*');
        assert_eq!(*keymap.label(3, 3), 'D');
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let result = Keymap::new(vec![vec!['1', '2'], vec!['3']]);
        assert_eq!(
            result.err(),
            Some(KeypadError::RaggedKeymap {
                row: 1,
                expected: 2,
                got: 1,
            })
        );
    }

    #[test]
    fn empty_keymap_is_allowed() {
        let keymap = Keymap::<char>::new(vec![]).unwrap();
        assert_eq!(keymap.rows(), 0);
        assert_eq!(keymap.cols(), 0);
    }

    #[test]
    fn single_column_keymap() {
        let keymap = Keymap::new(vec![vec!['a'], vec!['b'], vec!['c']]).unwrap();
        assert_eq!(keymap.rows(), 3);
        assert_eq!(keymap.cols(), 1);
        assert_eq!(*keymap.label(2, 0), 'c');
    }
}

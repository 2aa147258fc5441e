//! The module for the main app state and logic.

use log::{debug, info};
use pipad_gpio::GpioResult;
use pipad_gpio::keypad::Keypad;

/// The main app state struct.
pub struct App<'a> {
    /// The keypad to poll.
    keypad: &'a mut dyn Keypad<Key = char>,
    /// The keys that were held down at the previous update.
    held: Vec<char>,
}

impl<'a> App<'a> {
    /// Creates a new instance of the App.
    pub fn new(keypad: &'a mut dyn Keypad<Key = char>) -> App<'a> {
        App {
            keypad,
            held: Vec::new(),
        }
    }

    /// Scans the keypad once and logs every key that was pressed or
    /// released since the previous update.
    pub fn update(&mut self) -> GpioResult<()> {
        let pressed = self.keypad.scan()?;

        for key in excess(&pressed, &self.held) {
            info!("Key pressed: {}", key);
        }
        for key in excess(&self.held, &pressed) {
            info!("Key released: {}", key);
        }

        if !pressed.is_empty() {
            debug!("Keys held: {:?}", pressed);
        }

        self.held = pressed;
        Ok(())
    }
}

/// Occurrences in `these` without a one-to-one match in `others`.
/// Treats both slices as multisets; keymap labels may repeat.
fn excess(these: &[char], others: &[char]) -> Vec<char> {
    let mut unmatched = others.to_vec();
    let mut leftover = Vec::new();

    for &key in these {
        match unmatched.iter().position(|&other| other == key) {
            Some(index) => {
                unmatched.swap_remove(index);
            }
            None => leftover.push(key),
        }
    }

    leftover
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_labels_make_separate_edges() {
        assert_eq!(excess(&['x', 'x'], &['x']), vec!['x']);
        assert_eq!(excess(&['x'], &['x', 'x']), vec![]);
    }

    #[test]
    fn unchanged_keys_make_no_edges() {
        assert_eq!(excess(&['5', '8'], &['8', '5']), vec![]);
    }

    #[test]
    fn every_key_is_an_edge_against_an_empty_scan() {
        assert_eq!(excess(&['1', '2'], &[]), vec!['1', '2']);
        assert_eq!(excess(&[], &['1', '2']), vec![]);
    }
}

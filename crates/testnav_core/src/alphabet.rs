//! Home-row key alphabet.
//!
//! Keys are fixed-length words over eight home-row symbols. The symbol order is
//! also the digit order used when a counter is rendered in base 8, so `a` is
//! digit 0 and `l` is digit 7.

/// The eight key symbols, in digit order.
pub const ALPHABET: [char; 8] = ['a', 's', 'd', 'f', 'h', 'j', 'k', 'l'];

/// Key length for class-level shortcuts (8^4 = 4096 keys).
pub const CLASS_KEY_LEN: u32 = 4;

/// Key length for leaf test shortcuts (8^3 = 512 keys).
pub const FUNCTION_KEY_LEN: u32 = 3;

/// Return the digit value of a key symbol, if it belongs to the alphabet.
pub fn digit_of(symbol: char) -> Option<usize> {
    ALPHABET.iter().position(|c| *c == symbol)
}

/// Check whether `key` is non-empty and uses only alphabet symbols.
///
/// ## Examples
/// ```rust
/// use testnav_core::is_valid_key;
///
/// assert!(is_valid_key("asdf"));
/// assert!(!is_valid_key("abcd"));
/// ```
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| digit_of(c).is_some())
}

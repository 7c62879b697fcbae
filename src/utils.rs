/// Formats an unsigned count with comma thousands separators (`1234567` -> `1,234,567`).
pub fn format_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Checks that `buffer` holds exactly `len` copies of `value`.
/// Returns an error naming the first offending index otherwise.
pub fn verify_fill(buffer: &[i64], len: usize, value: i64) -> Result<(), String> {
    if buffer.len() != len {
        return Err(format!(
            "Buffer has {} elements, expected {}",
            buffer.len(),
            len
        ));
    }
    match buffer.iter().position(|&x| x != value) {
        Some(i) => Err(format!(
            "Wrong value at index {}: found {}, expected {}",
            i, buffer[i], value
        )),
        None => Ok(()),
    }
}

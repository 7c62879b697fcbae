//! Literal benchmark settings.

/// Element count filled by every strategy in the default run.
pub const LENGTH: usize = 2_146_435_071;

/// Value written into every slot (5^5).
pub const FILL_VALUE: i64 = 5i64.pow(5);

/// Powers of ten for a scaling sweep, smallest first.
pub const SWEEP_LENGTHS: &[usize] = &[
    10,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

/// Settings for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// One result row is printed per entry.
    pub lengths: Vec<usize>,
    pub value: i64,
    /// Copy accelerator results back to host memory inside the timed region.
    pub readback: bool,
    /// Wait for the user before the process exits.
    pub hold_on_exit: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            lengths: vec![LENGTH],
            value: FILL_VALUE,
            readback: true,
            hold_on_exit: true,
        }
    }
}

impl BenchConfig {
    /// Config for a single length with every other setting at its default.
    pub fn with_length(length: usize) -> Self {
        Self {
            lengths: vec![length],
            ..Self::default()
        }
    }
}

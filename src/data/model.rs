// ---------------------------------------------------------------------------
// Device capacity
// ---------------------------------------------------------------------------

/// Number of samples the AD9106 SRAM holds.
pub const MAX_SRAM_SAMPLES: usize = 4096;

/// Largest register value (9-bit unsigned).
pub const MAX_SRAM_VALUE: u16 = 511;

/// A quantized amplitude as stored in device SRAM, always in `0..=511`.
pub type RegisterValue = u16;

// ---------------------------------------------------------------------------
// Samples and channels
// ---------------------------------------------------------------------------

/// One column (tabular) or one audio channel, one sample per row/timepoint.
pub type Channel = Vec<f64>;

/// Parse a cell as a sample.  Anything that is not a finite number becomes 0.0.
pub fn to_sample(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Expected domain of a channel's raw values, mapped onto [-1.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRange {
    low: f64,
    high: f64,
}

impl ChannelRange {
    /// The canonical range.
    pub const CANONICAL: ChannelRange = ChannelRange { low: -1.0, high: 1.0 };

    /// Bounds given in the wrong order are swapped.
    pub fn new(a: f64, b: f64) -> Self {
        if a > b {
            ChannelRange { low: b, high: a }
        } else {
            ChannelRange { low: a, high: b }
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Map `value` linearly from this range onto [-1.0, 1.0], clamped.
    /// A degenerate range (`low == high`) maps everything to 0.0.
    pub fn normalize(&self, value: f64) -> f64 {
        let width = self.high - self.low;
        if width == 0.0 {
            return 0.0;
        }
        ((value - self.low) * 2.0 / width - 1.0).clamp(-1.0, 1.0)
    }
}

impl Default for ChannelRange {
    fn default() -> Self {
        ChannelRange::CANONICAL
    }
}

/// How channels are weighted when combined into one sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelSelection {
    /// Every channel weighted 1.0.
    #[default]
    All,
    /// One-hot: only this channel, weight 1.0.
    Single(usize),
    /// Explicit per-channel weights, padded with 0.0 or truncated to the
    /// channel count.  Negative weights are allowed.
    Weighted(Vec<f64>),
}

// ---------------------------------------------------------------------------
// Auto-detect vs explicit settings
// ---------------------------------------------------------------------------

/// A setting that is either inferred from the input or given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detect<T> {
    #[default]
    Auto,
    Explicit(T),
}

impl<T: Copy> Detect<T> {
    /// The explicit value, or `auto` when the setting is left to detection.
    pub fn or_else(self, auto: impl FnOnce() -> T) -> T {
        match self {
            Detect::Auto => auto(),
            Detect::Explicit(v) => v,
        }
    }
}

// ---------------------------------------------------------------------------
// LoadParameters – how a CSV or WAV source becomes register values
// ---------------------------------------------------------------------------

/// Immutable load configuration.  Build it once with the `with_*` methods
/// and pass it by reference into the loaders.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadParameters {
    start_row: usize,
    max_rows_to_read: Detect<usize>,
    max_rows_to_write: Detect<usize>,
    scale_auto: bool,
    scale_multiplier: f64,
    channel_ranges: Vec<Option<ChannelRange>>,
    selection: ChannelSelection,
    header: Detect<bool>,
    print_diagnostics: bool,
}

impl Default for LoadParameters {
    fn default() -> Self {
        Self {
            start_row: 0,
            max_rows_to_read: Detect::Auto,
            max_rows_to_write: Detect::Auto,
            scale_auto: false,
            scale_multiplier: 1.0,
            channel_ranges: Vec::new(),
            selection: ChannelSelection::All,
            header: Detect::Auto,
            print_diagnostics: true,
        }
    }
}

impl LoadParameters {
    pub fn with_start_row(mut self, start_row: usize) -> Self {
        self.start_row = start_row;
        self
    }

    /// Explicit counts above the SRAM capacity are clamped to it.
    pub fn with_max_rows_to_read(mut self, rows: Detect<usize>) -> Self {
        self.max_rows_to_read = clamp_to_capacity(rows);
        self
    }

    /// Explicit counts above the SRAM capacity are clamped to it.
    pub fn with_max_rows_to_write(mut self, rows: Detect<usize>) -> Self {
        self.max_rows_to_write = clamp_to_capacity(rows);
        self
    }

    pub fn with_scale_auto(mut self, scale_auto: bool) -> Self {
        self.scale_auto = scale_auto;
        self
    }

    pub fn with_scale_multiplier(mut self, multiplier: f64) -> Self {
        self.scale_multiplier = multiplier;
        self
    }

    /// Ranges indexed by channel; `None` entries use the canonical range.
    pub fn with_channel_ranges(mut self, ranges: Vec<Option<ChannelRange>>) -> Self {
        self.channel_ranges = ranges;
        self
    }

    pub fn with_selection(mut self, selection: ChannelSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_header(mut self, header: Detect<bool>) -> Self {
        self.header = header;
        self
    }

    pub fn with_print_diagnostics(mut self, print: bool) -> Self {
        self.print_diagnostics = print;
        self
    }

    pub fn start_row(&self) -> usize {
        self.start_row
    }

    /// Row/frame window shared by every extractor.
    pub fn window(&self) -> super::filter::RowWindow {
        super::filter::RowWindow::new(
            self.start_row,
            self.max_rows_to_read.or_else(|| MAX_SRAM_SAMPLES),
        )
    }

    /// Length the combined sequence is padded to.
    pub fn rows_to_write(&self) -> usize {
        self.max_rows_to_write.or_else(|| MAX_SRAM_SAMPLES)
    }

    pub fn scale_auto(&self) -> bool {
        self.scale_auto
    }

    pub fn scale_multiplier(&self) -> f64 {
        self.scale_multiplier
    }

    pub fn channel_ranges(&self) -> &[Option<ChannelRange>] {
        &self.channel_ranges
    }

    pub fn selection(&self) -> &ChannelSelection {
        &self.selection
    }

    pub fn header(&self) -> Detect<bool> {
        self.header
    }

    pub fn print_diagnostics(&self) -> bool {
        self.print_diagnostics
    }
}

fn clamp_to_capacity(rows: Detect<usize>) -> Detect<usize> {
    match rows {
        Detect::Explicit(n) => Detect::Explicit(n.min(MAX_SRAM_SAMPLES)),
        Detect::Auto => Detect::Auto,
    }
}

// ---------------------------------------------------------------------------
// Diagnostics – non-fatal conditions absorbed along the pipeline
// ---------------------------------------------------------------------------

/// Flags raised by stages that degrade instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    /// Some value fell outside the register range and was clamped.
    pub clipped: bool,
    /// The input held this many values and was cut to the SRAM capacity.
    pub truncated_from: Option<usize>,
}

impl Diagnostics {
    pub fn merge(self, other: Diagnostics) -> Diagnostics {
        Diagnostics {
            clipped: self.clipped || other.clipped,
            truncated_from: self.truncated_from.or(other.truncated_from),
        }
    }
}

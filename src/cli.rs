use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};

use crate::data::model::{ChannelRange, ChannelSelection, Detect, LoadParameters};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Issue commands to an AD9106 arbitrary waveform generator and load
/// waveforms into its SRAM.
///
/// Commands come from the command line or from script files.  Waveforms come
/// from CSV files (one or a weighted mix of columns) or WAV files (one or a
/// weighted mix of channels; 8-bit, 16-bit and wider PCM).
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "awg-loader")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Serial port of the device, such as COM3 or /dev/ttyACM0.  Without it
    /// nothing is sent (dry run).
    #[arg(short, long)]
    pub port: Option<String>,

    /// List the serial ports on this host
    #[arg(long)]
    pub list_ports: bool,

    /// Write every command, waveform data included, to this file for later
    /// replay with --pre-cmd/--post-cmd @FILE
    #[arg(short, long)]
    pub out_file: Option<PathBuf>,

    /// Print every command to the screen
    #[arg(short, long)]
    pub display_commands: bool,

    /// Command sent before the waveform data; `@FILE` sends a script file.
    /// Repeatable.
    #[arg(short = 'i', long = "pre-cmd", value_name = "CMD")]
    pub pre_cmd: Vec<String>,

    /// Command sent after the waveform data; `@FILE` sends a script file.
    /// Repeatable.
    #[arg(short = 'j', long = "post-cmd", value_name = "CMD")]
    pub post_cmd: Vec<String>,

    /// CSV file to read the waveform from (columns expected in [-1, 1]
    /// unless --column-range says otherwise)
    #[arg(long, conflicts_with = "wav")]
    pub csv: Option<PathBuf>,

    /// WAV file to read the waveform from
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Read a single column (CSV) or channel (WAV); 0 is the first
    #[arg(short = 'c', long, conflicts_with = "column_weights")]
    pub column_selected: Option<usize>,

    /// Treat the first CSV row as a header (default: auto-detect)
    #[arg(long, overrides_with = "no_csv_header")]
    pub csv_header: bool,

    /// Treat the first CSV row as data
    #[arg(long, overrides_with = "csv_header")]
    pub no_csv_header: bool,

    /// Scale the waveform so its peak magnitude is 1.0
    #[arg(short = 'a', long)]
    pub scale_auto: bool,

    /// Multiply the waveform, after --scale-auto; large values clip
    #[arg(short = 'm', long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub scale_multiplier: f64,

    /// Index of the first row (CSV) or frame (WAV) to read
    #[arg(short = 'f', long)]
    pub arb_first_read_index: Option<usize>,

    /// Maximum rows/frames to read (default: until the SRAM is full)
    #[arg(short = 'n', long)]
    pub arb_read_count: Option<usize>,

    /// Samples to write to SRAM; the last value read is repeated to fill
    /// (default: SRAM capacity)
    #[arg(short = 'w', long)]
    pub arb_write_count: Option<usize>,

    /// Per-column/channel weights for a weighted average; negative weights
    /// invert.  Example: `-t 1.0 0.5` mixes left at twice the right.
    #[arg(short = 't', long, num_args = 1.., allow_negative_numbers = true)]
    pub column_weights: Vec<f64>,

    /// Value range of a CSV column: COLUMN LOW HIGH.  Repeatable.
    #[arg(
        short = 'r',
        long,
        num_args = 3,
        value_names = ["COLUMN", "LOW", "HIGH"],
        allow_negative_numbers = true,
        action = ArgAction::Append
    )]
    pub column_range: Vec<f64>,

    /// Do not print informational messages
    #[arg(long)]
    pub no_messages: bool,
}

impl Cli {
    /// Cross-option checks clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.csv.is_some() && self.column_selected.is_none() && self.column_weights.is_empty() {
            bail!("--csv requires --column-selected or --column-weights");
        }
        self.channel_ranges().map(|_| ())
    }

    fn header(&self) -> Detect<bool> {
        match (self.csv_header, self.no_csv_header) {
            (true, _) => Detect::Explicit(true),
            (_, true) => Detect::Explicit(false),
            _ => Detect::Auto,
        }
    }

    fn selection(&self) -> ChannelSelection {
        match self.column_selected {
            Some(index) => ChannelSelection::Single(index),
            None if !self.column_weights.is_empty() => {
                ChannelSelection::Weighted(self.column_weights.clone())
            }
            None => ChannelSelection::All,
        }
    }

    /// `--column-range` triples as a list indexed by column.
    fn channel_ranges(&self) -> Result<Vec<Option<ChannelRange>>> {
        let mut ranges: Vec<Option<ChannelRange>> = Vec::new();
        for triple in self.column_range.chunks_exact(3) {
            let (column, low, high) = (triple[0], triple[1], triple[2]);
            if column < 0.0 || column.fract() != 0.0 {
                bail!("--column-range column must be a non-negative integer, got {column}");
            }
            let column = column as usize;
            if ranges.len() <= column {
                ranges.resize(column + 1, None);
            }
            ranges[column] = Some(ChannelRange::new(low, high));
        }
        Ok(ranges)
    }

    pub fn load_parameters(&self) -> Result<LoadParameters> {
        let explicit = |n: Option<usize>| n.map_or(Detect::Auto, Detect::Explicit);
        Ok(LoadParameters::default()
            .with_start_row(self.arb_first_read_index.unwrap_or(0))
            .with_max_rows_to_read(explicit(self.arb_read_count))
            .with_max_rows_to_write(explicit(self.arb_write_count))
            .with_scale_auto(self.scale_auto)
            .with_scale_multiplier(self.scale_multiplier)
            .with_channel_ranges(self.channel_ranges()?)
            .with_selection(self.selection())
            .with_header(self.header())
            .with_print_diagnostics(!self.no_messages))
    }
}

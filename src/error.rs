use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy for loading and transmitting waveforms
// ---------------------------------------------------------------------------

/// Fatal conditions.  Malformed cells, clipping and capacity overruns are not
/// errors: they degrade to defined output and are reported through
/// [`Diagnostics`](crate::data::model::Diagnostics).
#[derive(Debug, Error)]
pub enum Error {
    /// Audio encoding other than uncompressed integer PCM.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The selected channel (column) does not exist in the source.
    #[error("selected channel {index} is out of range, 0 thru {} allowed for this source", .available.saturating_sub(1))]
    IndexOutOfRange { index: usize, available: usize },

    /// The device did not answer an acknowledgment request in time.
    #[error(
        "did not receive {:?} from the device, got {:?} instead",
        String::from_utf8_lossy(.expected),
        String::from_utf8_lossy(.received)
    )]
    ProtocolTimeout { expected: Vec<u8>, received: Vec<u8> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_names_allowed_range() {
        let err = Error::IndexOutOfRange { index: 4, available: 2 };
        assert_eq!(
            err.to_string(),
            "selected channel 4 is out of range, 0 thru 1 allowed for this source"
        );
    }

    #[test]
    fn timeout_error_shows_received_bytes() {
        let err = Error::ProtocolTimeout {
            expected: b"OVER".to_vec(),
            received: b"OV".to_vec(),
        };
        assert_eq!(
            err.to_string(),
            "did not receive \"OVER\" from the device, got \"OV\" instead"
        );
    }
}

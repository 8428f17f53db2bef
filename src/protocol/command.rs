use std::fmt;

use crate::data::model::{Diagnostics, RegisterValue, MAX_SRAM_SAMPLES, MAX_SRAM_VALUE};

/// Line terminator closing every command.
pub const EOL: &[u8] = b"\r\n";

/// Acknowledgment token the device answers an `OVER` request with.
pub const ACK_TOKEN: &[u8] = b"OVER";

/// Register values per data-load command.
pub const BLOCK_SIZE: usize = 64;

/// Bytes read back after an `XXX` query.
pub const QUERY_RESPONSE_SIZE: usize = 1024;

const DATA_LOAD_TAG: u8 = b'Z';
const QUERY: &[u8] = b"XXX";
const CHANNEL_PREFIX: &[u8] = b"CHANNEL";

// ---------------------------------------------------------------------------
// Command – one framed protocol line
// ---------------------------------------------------------------------------

/// What a command does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `Z<block><values>`: loads SRAM and leaves an acknowledgment owed.
    DataLoad,
    /// `OVER`: asks the device to confirm it finished the last burst.
    AckRequest,
    /// `XXX`: the device answers with a status dump.
    Query,
    /// `CHANNEL...`: reconfigures an output; the device needs extra time.
    Channel,
    Other,
}

impl CommandKind {
    fn classify(body: &[u8]) -> Self {
        if body == ACK_TOKEN {
            CommandKind::AckRequest
        } else if body == QUERY {
            CommandKind::Query
        } else if body.starts_with(CHANNEL_PREFIX) {
            CommandKind::Channel
        } else if body.first() == Some(&DATA_LOAD_TAG) {
            CommandKind::DataLoad
        } else {
            CommandKind::Other
        }
    }
}

/// A single CRLF-terminated command.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    bytes: Vec<u8>,
}

impl Command {
    /// Frame one line (without terminator) and classify it.
    pub fn new(line: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(line.len() + EOL.len());
        bytes.extend_from_slice(line);
        bytes.extend_from_slice(EOL);
        Command {
            kind: CommandKind::classify(line),
            bytes,
        }
    }

    pub fn ack_request() -> Self {
        Command::new(ACK_TOKEN)
    }

    /// Split a script on CR and LF into commands.  Empty lines are dropped
    /// and every line is re-terminated with CRLF.
    pub fn parse_script(script: &[u8]) -> Vec<Command> {
        script
            .split(|&b| b == b'\r' || b == b'\n')
            .filter(|line| !line.is_empty())
            .map(Command::new)
            .collect()
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The framed bytes, terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The command without its terminator.
    pub fn body(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - EOL.len()]
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("kind", &self.kind)
            .field("body", &String::from_utf8_lossy(self.body()))
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.body()))
    }
}

// ---------------------------------------------------------------------------
// Data-load encoding
// ---------------------------------------------------------------------------

/// Data-load commands for one SRAM image.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLoad {
    pub commands: Vec<Command>,
    /// Values actually encoded (after truncation).
    pub value_count: usize,
    pub diagnostics: Diagnostics,
}

/// Encode register values as `Z` commands of up to 64 values each.
///
/// Input beyond the SRAM capacity is dropped and values above 511 are
/// clamped; both are flagged in the diagnostics.  The last block may be
/// short.
pub fn encode_data_load(values: &[RegisterValue]) -> DataLoad {
    let mut diagnostics = Diagnostics::default();
    let values = if values.len() > MAX_SRAM_SAMPLES {
        diagnostics.truncated_from = Some(values.len());
        &values[..MAX_SRAM_SAMPLES]
    } else {
        values
    };

    let commands = values
        .chunks(BLOCK_SIZE)
        .enumerate()
        .map(|(block, chunk)| {
            let mut line = Vec::with_capacity(3 + chunk.len() * 3);
            line.push(DATA_LOAD_TAG);
            line.extend_from_slice(format!("{block:02}").as_bytes());
            for &value in chunk {
                if value > MAX_SRAM_VALUE {
                    diagnostics.clipped = true;
                }
                let value = value.min(MAX_SRAM_VALUE);
                line.extend_from_slice(format!("{value:03}").as_bytes());
            }
            Command::new(&line)
        })
        .collect();

    DataLoad {
        commands,
        value_count: values.len(),
        diagnostics,
    }
}

/// Parse a data-load command back into its block index and values.
/// Returns `None` for any other command or a malformed body.
pub fn decode_data_load(command: &Command) -> Option<(usize, Vec<RegisterValue>)> {
    if command.kind() != CommandKind::DataLoad {
        return None;
    }
    let body = std::str::from_utf8(command.body()).ok()?;
    let digits = body.get(1..)?;
    if digits.len() < 2 || (digits.len() - 2) % 3 != 0 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let block = digits[..2].parse().ok()?;
    let values = digits.as_bytes()[2..]
        .chunks(3)
        .map(|d| std::str::from_utf8(d).ok()?.parse().ok())
        .collect::<Option<Vec<RegisterValue>>>()?;
    Some((block, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_classified() {
        assert_eq!(Command::new(b"OVER").kind(), CommandKind::AckRequest);
        assert_eq!(Command::new(b"Z00123").kind(), CommandKind::DataLoad);
        assert_eq!(Command::new(b"XXX").kind(), CommandKind::Query);
        assert_eq!(Command::new(b"CHANNEL 1").kind(), CommandKind::Channel);
        assert_eq!(Command::new(b"SP 10").kind(), CommandKind::Other);
        assert_eq!(Command::new(b"OVERT").kind(), CommandKind::Other);
    }

    #[test]
    fn script_is_split_and_reterminated() {
        let cmds = Command::parse_script(b"A 1\r\n\r\nB 2\rC 3\n");
        let framed: Vec<&[u8]> = cmds.iter().map(Command::as_bytes).collect();
        assert_eq!(
            framed,
            vec![&b"A 1\r\n"[..], &b"B 2\r\n"[..], &b"C 3\r\n"[..]]
        );
        assert!(Command::parse_script(b"\r\n\n").is_empty());
    }

    #[test]
    fn data_load_framing() {
        let load = encode_data_load(&[0, 7, 511]);
        assert_eq!(load.commands.len(), 1);
        assert_eq!(load.commands[0].as_bytes(), b"Z00000007511\r\n");
        assert_eq!(load.diagnostics, Diagnostics::default());
    }

    #[test]
    fn partial_final_block_is_terminated() {
        let values: Vec<RegisterValue> = (0..130).map(|i| i % 512).collect();
        let load = encode_data_load(&values);
        assert_eq!(load.commands.len(), 3);
        let last = &load.commands[2];
        assert!(last.as_bytes().starts_with(b"Z02128"));
        assert!(last.as_bytes().ends_with(b"129\r\n"));
        assert_eq!(last.as_bytes().len(), 3 + 2 * 3 + 2);
    }

    #[test]
    fn encoding_round_trips() {
        let values: Vec<RegisterValue> = (0..1000).map(|i| (i * 37 % 512) as u16).collect();
        let load = encode_data_load(&values);
        let mut decoded = Vec::new();
        for (i, cmd) in load.commands.iter().enumerate() {
            let (block, chunk) = decode_data_load(cmd).unwrap();
            assert_eq!(block, i);
            decoded.extend(chunk);
        }
        assert_eq!(decoded, values);
    }

    #[test]
    fn capacity_and_range_are_enforced() {
        let mut values = vec![600; MAX_SRAM_SAMPLES + 10];
        values[0] = 1;
        let load = encode_data_load(&values);
        assert_eq!(load.commands.len(), 64);
        assert_eq!(load.value_count, MAX_SRAM_SAMPLES);
        assert_eq!(load.diagnostics.truncated_from, Some(MAX_SRAM_SAMPLES + 10));
        assert!(load.diagnostics.clipped);
        assert!(load.commands[63].as_bytes().starts_with(b"Z63511"));
        let (_, first) = decode_data_load(&load.commands[0]).unwrap();
        assert_eq!(first[0], 1);
        assert_eq!(first[1], 511);
    }

    #[test]
    fn empty_input_encodes_nothing() {
        let load = encode_data_load(&[]);
        assert!(load.commands.is_empty());
        assert_eq!(load.value_count, 0);
    }

    #[test]
    fn decode_rejects_other_commands() {
        assert!(decode_data_load(&Command::ack_request()).is_none());
        assert!(decode_data_load(&Command::new(b"Z0012")).is_none());
        assert!(decode_data_load(&Command::new(b"Zab123")).is_none());
    }
}

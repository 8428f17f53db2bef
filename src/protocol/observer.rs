use std::io::Write;

/// Sees every command the session writes, connected or not.
pub trait CommandObserver {
    fn on_command(&mut self, framed: &[u8]);
}

/// Appends every written command, terminator included, to a writer.  The
/// result can be replayed later as a command script.
pub struct Transcript<W: Write> {
    writer: W,
}

impl<W: Write> Transcript<W> {
    pub fn new(writer: W) -> Self {
        Transcript { writer }
    }
}

impl<W: Write> CommandObserver for Transcript<W> {
    fn on_command(&mut self, framed: &[u8]) {
        if let Err(e) = self.writer.write_all(framed) {
            log::error!("failed to append to transcript: {e}");
        }
    }
}

impl<W: Write> Drop for Transcript<W> {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::error!("failed to flush transcript: {e}");
        }
    }
}

/// Prints each command on its own line, without the terminator.
pub struct ConsoleEcho;

impl CommandObserver for ConsoleEcho {
    fn on_command(&mut self, framed: &[u8]) {
        let text = String::from_utf8_lossy(framed);
        println!("{}", text.trim_end_matches(['\r', '\n']));
    }
}

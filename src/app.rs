use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::cli::Cli;
use crate::data::loader::{self, Waveform};
use crate::data::model::{LoadParameters, MAX_SRAM_SAMPLES, MAX_SRAM_VALUE};
use crate::protocol::command::{encode_data_load, Command};
use crate::protocol::observer::{ConsoleEcho, Transcript};
use crate::protocol::session::Session;
use crate::protocol::transport::{self, Transport};

// ---------------------------------------------------------------------------
// Loader application: pre-commands → waveform → post-commands
// ---------------------------------------------------------------------------

pub struct AwgApp<T: Transport> {
    pub session: Session<T>,
    pub params: LoadParameters,
}

/// Which loader a waveform file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Wav,
}

impl<T: Transport> AwgApp<T> {
    pub fn new(session: Session<T>, params: LoadParameters) -> Self {
        Self { session, params }
    }

    /// Send a list of commands as one burst, then settle.  An entry starting
    /// with `@` names a script file whose lines are sent instead.
    pub fn run_commands(&mut self, entries: &[String]) -> Result<()> {
        let mut commands = Vec::new();
        for entry in entries.iter().filter(|e| !e.is_empty()) {
            match entry.strip_prefix('@') {
                Some(path) => {
                    let script = std::fs::read(path)
                        .with_context(|| format!("reading command file {path}"))?;
                    commands.extend(Command::parse_script(&script));
                }
                None => commands.extend(Command::parse_script(entry.as_bytes())),
            }
        }
        if commands.is_empty() {
            return Ok(());
        }
        self.session.send_burst(&commands)?;
        self.session.settle()?;
        Ok(())
    }

    pub fn load(&self, path: &Path, kind: SourceKind) -> Result<Waveform> {
        match kind {
            SourceKind::Csv => loader::load_csv(path, &self.params),
            SourceKind::Wav => loader::load_wav(path, &self.params),
        }
    }

    /// Encode a waveform into data-load commands and send them as one burst
    /// closed by an acknowledgment.
    pub fn send_waveform(&mut self, waveform: &Waveform) -> Result<()> {
        let load = encode_data_load(&waveform.registers);
        let diagnostics = waveform.diagnostics.merge(load.diagnostics);

        if self.params.print_diagnostics() {
            if let Some(count) = diagnostics.truncated_from {
                warn!(
                    "too many values ({count}) specified for SRAM data, truncating to the first {MAX_SRAM_SAMPLES} values"
                );
            }
            if diagnostics.clipped {
                warn!("some values were out-of-range and clipped to 0 and/or {MAX_SRAM_VALUE}");
            }
            info!("Generated {} SRAM values.", load.value_count);
        }

        self.session
            .send_burst(&load.commands)
            .context("sending waveform data")?;
        self.session
            .settle()
            .context("waiting for the device to accept waveform data")?;
        Ok(())
    }

    /// Settle any owed acknowledgment and release the transport.
    pub fn finish(self) -> Result<()> {
        self.session.close().context("closing session")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(cli: &Cli) -> Result<()> {
    cli.validate()?;

    if cli.list_ports {
        list_ports()?;
    }

    let params = cli.load_parameters()?;
    let port = match cli.port.as_deref() {
        Some(name) => Some(
            transport::open_serial(name).with_context(|| format!("opening serial port {name}"))?,
        ),
        None => None,
    };

    let mut session = Session::new(port);
    if let Some(path) = &cli.out_file {
        let file = File::create(path)
            .with_context(|| format!("creating command log {}", path.display()))?;
        session = session.with_observer(Transcript::new(BufWriter::new(file)));
    }
    if cli.display_commands {
        session = session.with_observer(ConsoleEcho);
    }

    let mut app = AwgApp::new(session, params);

    app.run_commands(&cli.pre_cmd).context("running pre-commands")?;

    let source = match (&cli.csv, &cli.wav) {
        (Some(path), _) => Some((path, SourceKind::Csv)),
        (None, Some(path)) => Some((path, SourceKind::Wav)),
        (None, None) => None,
    };
    if let Some((path, kind)) = source {
        let waveform = app.load(path, kind)?;
        app.send_waveform(&waveform)?;
    }

    app.run_commands(&cli.post_cmd).context("running post-commands")?;
    app.finish()
}

fn list_ports() -> Result<()> {
    let ports = transport::available_ports().context("listing serial ports")?;
    println!("Available serial ports (AWG AD9106 has USB VID & PID of 0x0483 & 0x5740):");
    if ports.is_empty() {
        println!("   None found");
    }
    for port in &ports {
        print!("{}", transport::describe_port(port));
    }
    Ok(())
}

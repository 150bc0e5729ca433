//! enhance-with-ai: terminal front end.
//! Loads credentials, composes the prompt from an instruction and text (argument
//! or stdin), streams the answer to stdout. Ctrl-C stops the stream.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use enhance_client::{
    config, logging, pump_session, Client, Instruction, Preset, SendController, SendOutcome,
    SessionSink, CUSTOM_LABEL, DEFAULT_ENDPOINT,
};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "enhance-with-ai", version, about = "Send text to a chat model with an instruction")]
struct Cli {
    /// Preset label (Summarize, Explain, Enhance, Proofread) or your own instruction
    #[arg(short, long, default_value = "Summarize")]
    instruction: String,

    /// Text to work on; read from stdin when omitted
    text: Vec<String>,

    /// Config file path
    #[arg(long, env = "ENHANCE_WITH_AI_CONFIG")]
    config: Option<PathBuf>,

    /// Chat-completion endpoint
    #[arg(long, env = "ENHANCE_WITH_AI_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Print the preset instructions and exit
    #[arg(long)]
    list_presets: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Writes fragments to stdout as they arrive; errors go to stderr.
struct TerminalSink<W: Write> {
    out: W,
    wrote_output: bool,
    failed: bool,
}

impl<W: Write> TerminalSink<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            wrote_output: false,
            failed: false,
        }
    }
}

impl<W: Write> SessionSink for TerminalSink<W> {
    fn on_fragment(&mut self, text: &str) {
        let _ = write!(self.out, "{}", text);
        let _ = self.out.flush();
        self.wrote_output = true;
    }

    fn on_error(&mut self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
        self.failed = true;
    }

    fn on_sending_changed(&mut self, sending: bool) {
        if !sending && self.wrote_output {
            // Newline after the answer text.
            let _ = writeln!(self.out);
            let _ = self.out.flush();
        }
    }
}

fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    config::default_config_path()
        .context("unable to determine config path (set --config or ENHANCE_WITH_AI_CONFIG)")
}

fn read_text(cli: &Cli) -> anyhow::Result<String> {
    if !cli.text.is_empty() {
        return Ok(cli.text.join(" "));
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut text = String::new();
    stdin
        .lock()
        .read_to_string(&mut text)
        .context("failed to read text from stdin")?;
    Ok(text)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose).map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    if cli.list_presets {
        for preset in Preset::ALL {
            println!("{}", preset);
        }
        println!("{}", CUSTOM_LABEL);
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = resolve_config_path(&cli)?;
    debug!(path = %config_path.display(), "loading config");
    let credentials = match config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", e.title(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let text = read_text(&cli)?;
    let instruction = Instruction::from_label(&cli.instruction);
    let client = Client::with_endpoint(&cli.endpoint).context("failed to build HTTP client")?;
    debug!(endpoint = client.endpoint(), model = %credentials.model, "client ready");
    let (controller, mut events) =
        SendController::new(client, credentials, tokio::runtime::Handle::current());

    let stdout = io::stdout();
    let mut sink = TerminalSink::new(stdout.lock());

    match controller.send(&text, &instruction) {
        SendOutcome::Started => {
            let pump = pump_session(&mut events, &mut sink);
            tokio::pin!(pump);
            let mut stopping = false;
            loop {
                tokio::select! {
                    _ = &mut pump => break,
                    signal = tokio::signal::ctrl_c(), if !stopping => {
                        if signal.is_ok() {
                            controller.stop();
                        }
                        stopping = true;
                    }
                }
            }
            controller.wait_idle().await;
        }
        SendOutcome::NothingToSend | SendOutcome::Busy => {
            enhance_client::drain(&mut events, &mut sink);
        }
    }

    Ok(if sink.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

//! Enhance With AI core: config loading, streaming chat-completion client and
//! the send controller the UI layer drives. Used by the terminal adapter.

pub mod client;
pub mod config;
pub mod controller;
pub mod logging;
pub mod messages;
pub mod prompt;
pub mod sse;

pub use client::{Client, ClientError, FragmentStream, DEFAULT_ENDPOINT};
pub use config::{default_config_path, ConfigError, Credentials, DEFAULT_MODEL};
pub use controller::{dispatch, drain, pump_session, SendController, SendOutcome, SessionSink, UiEvent};
pub use prompt::{compose, Instruction, Preset, PromptError, CUSTOM_LABEL};

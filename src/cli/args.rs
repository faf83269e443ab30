//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::config::{AppConfig, ConfigPatch};
use crate::core::types::PromptKey;
use crate::stream::framing::FramingKind;

#[derive(Parser, Debug)]
#[command(name = "scholar")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Generation endpoint URL
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// How the response body is framed
    #[arg(long, value_enum, global = true)]
    pub framing: Option<FramingKind>,

    /// JSON key that carries the prompt
    #[arg(long, value_enum, global = true)]
    pub prompt_key: Option<PromptKey>,

    /// Restrict analysis to a framework (repeatable; omit for all)
    #[arg(long = "framework", global = true)]
    pub frameworks: Vec<String>,

    /// Request deep multi-framework analysis
    #[arg(long, global = true)]
    pub deep: bool,

    /// Cancel an exchange still running after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Flags win over file and environment settings.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(framing) = self.framing {
            config.framing = Some(framing);
        }
        if let Some(prompt_key) = self.prompt_key {
            config.prompt_key = Some(prompt_key);
        }
        if !self.frameworks.is_empty() {
            config.frameworks = Some(self.frameworks.clone());
        }
        if self.deep {
            config.deep_analysis = Some(true);
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question and stream the answer
    Ask {
        /// The question to ask
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Print the final transcript as JSON instead of streaming text
        #[arg(long)]
        json: bool,
    },
    /// Interactive session (default). Type /history to reprint, /exit to quit
    Chat,
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigSubcommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommands {
    /// Initialize a new config file
    Init,
    /// Print config file location
    Where,
    /// Persist settings to the config file
    Set {
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, value_enum)]
        framing: Option<FramingKind>,
        #[arg(long, value_enum)]
        prompt_key: Option<PromptKey>,
    },
}

impl ConfigSubcommands {
    #[must_use]
    pub fn patch(&self) -> Option<ConfigPatch> {
        match self {
            Self::Set {
                endpoint,
                framing,
                prompt_key,
            } => Some(ConfigPatch {
                endpoint: endpoint.clone(),
                framing: *framing,
                prompt_key: *prompt_key,
            }),
            Self::Init | Self::Where => None,
        }
    }
}

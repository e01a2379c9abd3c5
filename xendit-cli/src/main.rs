//! Xendit CLI - tokenize cards and run 3-D Secure authentications from a terminal
//!
//! The step-up challenge is surfaced by printing the payer authentication URL
//! to stderr. After completing the challenge in a browser, paste the message
//! the challenge page posted (for example
//! `{"status":"VERIFIED","id":"auth_1"}`) on stdin.
//!
//! # Usage
//!
//! ```bash
//! export XENDIT_PUBLISHABLE_KEY=xnd_public_development_...
//! xendit-cli token --number 4000000000000002 --exp-month 12 --exp-year 2030 --cvn 123 --amount 10000
//! xendit-cli token --number 4000000000000002 --exp-month 12 --exp-year 2030 --multiple-use
//! xendit-cli authenticate --token-id 5f0410898bcf7a001a00879d --amount 10000
//! ```

mod observability;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, warn};
use xendit_bridge::{
    ClientConfig, TokenRequest, XenditClientBuilder,
    error::{Result, XenditError},
    models::Card,
    step_up::{StepUpLaunch, StepUpNotifier, StepUpSurface},
};

use crate::observability::{LogFormat, init_observability};

#[derive(Debug, Parser)]
#[command(name = "xendit-cli")]
#[command(about = "Tokenize cards against the Xendit API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "XENDIT_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a single-use or multiple-use token
    Token {
        /// Card number
        #[arg(long)]
        number: String,

        /// Expiration month, 1-12
        #[arg(long)]
        exp_month: String,

        /// Expiration year, two or four digits
        #[arg(long)]
        exp_year: String,

        /// Card verification number
        #[arg(long)]
        cvn: Option<String>,

        /// Amount for single-use tokens
        #[arg(long, default_value_t = 0)]
        amount: u64,

        /// Skip 3-D Secure authentication
        #[arg(long)]
        no_authenticate: bool,

        /// Create a multiple-use token
        #[arg(long, conflicts_with = "amount")]
        multiple_use: bool,
    },

    /// Authenticate an existing multiple-use token
    Authenticate {
        /// Token id
        #[arg(long)]
        token_id: String,

        /// Amount to authenticate
        #[arg(long)]
        amount: u64,
    },
}

/// Surfaces the challenge on the terminal and feeds the next stdin line
/// back as the notification.
#[derive(Debug)]
struct TerminalSurface {
    notifier: StepUpNotifier,
}

impl StepUpSurface for TerminalSurface {
    fn launch(&self, launch: StepUpLaunch) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| XenditError::configuration(format!("terminal surface needs a runtime: {e}")))?;

        match &launch.authentication.payer_authentication_url {
            Some(url) => eprintln!("Complete 3-D Secure at: {url}"),
            None => warn!("authentication has no payer URL"),
        }
        eprintln!("Paste the challenge result for {} and press enter:", launch.correlation_id);

        let notifier = self.notifier.clone();
        let correlation_id = launch.correlation_id;
        runtime.spawn(async move {
            let mut line = String::new();
            match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
                Ok(0) => {
                    debug!("stdin closed, cancelling step-up");
                    notifier.cancel(correlation_id);
                }
                Ok(_) => {
                    notifier.notify(correlation_id, line.trim_end());
                }
                Err(e) => {
                    error!(error = %e, "failed to read challenge result");
                    notifier.cancel(correlation_id);
                }
            }
        });
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_observability(cli.log_format.unwrap_or_else(LogFormat::from_env), "info");

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(code = e.code(), kind = %e.kind(), "request failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    let notifier = StepUpNotifier::new();
    let client = XenditClientBuilder::from_config(&config)?
        .notifier(notifier.clone())
        .surface(Arc::new(TerminalSurface { notifier }))
        .build()?;

    let value = match cli.command {
        Command::Token { number, exp_month, exp_year, cvn, amount, no_authenticate, multiple_use } => {
            let mut card = Card::new(number, exp_month, exp_year);
            if let Some(cvn) = cvn {
                card = card.with_cvn(cvn);
            }
            let request = if multiple_use {
                TokenRequest::multiple_use(card)
            } else {
                TokenRequest::single_use(card, amount, !no_authenticate)
            };
            serde_json::to_string_pretty(&client.create_token(request).await?)
        }
        Command::Authenticate { token_id, amount } => {
            serde_json::to_string_pretty(&client.create_authentication(&token_id, amount).await?)
        }
    };
    value.map_err(|e| XenditError::server(format!("cannot render result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_command() {
        let cli = Cli::try_parse_from([
            "xendit-cli",
            "token",
            "--number",
            "4111111111111111",
            "--exp-month",
            "12",
            "--exp-year",
            "2030",
            "--cvn",
            "123",
            "--amount",
            "1000",
        ])
        .unwrap();
        let Command::Token { amount, cvn, no_authenticate, multiple_use, .. } = cli.command else {
            panic!("expected token command");
        };
        assert_eq!(amount, 1000);
        assert_eq!(cvn.as_deref(), Some("123"));
        assert!(!no_authenticate);
        assert!(!multiple_use);
    }

    #[test]
    fn test_multiple_use_conflicts_with_amount() {
        let result = Cli::try_parse_from([
            "xendit-cli",
            "token",
            "--number",
            "4111111111111111",
            "--exp-month",
            "12",
            "--exp-year",
            "2030",
            "--amount",
            "5",
            "--multiple-use",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_authenticate_command() {
        let cli =
            Cli::try_parse_from(["xendit-cli", "--log-format", "json", "authenticate", "--token-id", "tok", "--amount", "9"])
                .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(matches!(cli.command, Command::Authenticate { amount: 9, .. }));
    }
}

//! Multiple-use token example.
//!
//! Pre-validates a card with the client's validator, creates a multiple-use
//! token, then runs a 3-D Secure authentication for a charge against it.
//!
//! # Running this example
//!
//! ```bash
//! export XENDIT_PUBLISHABLE_KEY=xnd_public_development_...
//! cargo run --example multiple_use_token
//! ```
//!
//! When a challenge is required, open the printed URL and paste the
//! challenge result on stdin.

#![allow(clippy::print_stdout, clippy::print_stderr, reason = "examples are allowed to use println")]

use std::{io::BufRead, sync::Arc};

use xendit_bridge::{
    ClientConfig, ErrorKind, XenditClientBuilder,
    models::Card,
    step_up::{StepUpLaunch, StepUpNotifier, StepUpSurface},
};

/// Prints the challenge URL and forwards one stdin line from a blocking
/// thread.
#[derive(Debug)]
struct PromptSurface {
    notifier: StepUpNotifier,
}

impl StepUpSurface for PromptSurface {
    fn launch(&self, launch: StepUpLaunch) -> xendit_bridge::Result<()> {
        println!("Open {:?} and paste the result:", launch.authentication.payer_authentication_url);
        let notifier = self.notifier.clone();
        std::thread::spawn(move || {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(n) if n > 0 => notifier.notify(launch.correlation_id, line.trim_end()),
                _ => notifier.cancel(launch.correlation_id),
            };
        });
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let notifier = StepUpNotifier::new();
    let client = XenditClientBuilder::from_config(&ClientConfig::default())?
        .notifier(notifier.clone())
        .surface(Arc::new(PromptSurface { notifier }))
        .build()?;

    let card = Card::new("4000000000000002", "12", "2030").with_cvn("123");
    let validator = client.validator();
    if !validator.is_card_number_valid(card.number()) || !validator.is_expiry_valid(card.exp_month(), card.exp_year())
    {
        eprintln!("card {card:?} is invalid");
        return Ok(());
    }

    let token = client.create_multiple_use_token(card).await?;
    println!("multiple-use token: {}", token.id);

    match client.create_authentication(&token.id, 50_000).await {
        Ok(authentication) => println!("authentication {} is {}", authentication.id, authentication.status),
        Err(e) if e.kind() == ErrorKind::AuthenticationFailed => println!("declined: {}", e.message()),
        Err(e) if e.kind() == ErrorKind::Timeout => println!("no challenge result received"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

//! CLI command definitions and handlers

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;

use crate::core::config::ExplainerConfig;
use crate::core::errors::ExplainerError;
use crate::core::explainer::Explainer;
use crate::core::models::{DrugPair, LookupOutcome, NO_MATCH_NOTICE};

/// Commands for the drug interaction explainer
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the interactive web app
    Serve {
        /// Bind address (default: 127.0.0.1)
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Listen port (default: 8501)
        #[arg(short, long, default_value_t = 8501)]
        port: u16,
    },

    /// List the drug pairs in the dataset
    Pairs,

    /// Show the interaction for a pair, e.g. "Warfarin + Aspirin"
    Show {
        /// Drug pair as "<drug 1> + <drug 2>"
        pair: String,

        /// Skip the model call
        #[arg(long)]
        no_simplify: bool,

        /// Also fetch UMLS definitions for the codes
        #[arg(long)]
        definitions: bool,
    },

    /// Simplify arbitrary interaction text
    Simplify {
        /// Interaction description to simplify
        text: String,
    },

    /// Look up the UMLS definition of a CUI
    Define {
        /// Concept unique identifier, e.g. C0043031
        cui: String,
    },
}

/// Terminal spinner cleared on drop
struct Spinner {
    progress_bar: ProgressBar,
}

impl Spinner {
    fn new(message: &str) -> Self {
        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            progress_bar.set_style(style);
        }
        progress_bar.set_message(message.to_string());
        progress_bar.enable_steady_tick(Duration::from_millis(80));
        Self { progress_bar }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.progress_bar.finish_and_clear();
    }
}

/// Handle server command
pub async fn handle_serve(config: &ExplainerConfig, host: String, port: u16) -> anyhow::Result<()> {
    use crate::server::api::run_server;

    let explainer = {
        let _spinner = Spinner::new("🔄 Loading dataset and simplifier...");
        Explainer::from_config(config)?
    };

    info!("Starting HTTP server on {}:{}", host, port);
    println!("🚀 Drug Interaction Explainer on http://{}:{}", host, port);

    run_server(host, port, explainer).await?;

    Ok(())
}

/// Handle pairs command
pub async fn handle_pairs(config: &ExplainerConfig) -> anyhow::Result<()> {
    let explainer = Explainer::from_config(config)?;

    for pair in explainer.pairs() {
        println!("{}", pair);
    }

    Ok(())
}

/// Handle show command
pub async fn handle_show(
    config: &ExplainerConfig,
    pair: String,
    no_simplify: bool,
    definitions: bool,
) -> anyhow::Result<()> {
    let explainer = Explainer::from_config(config)?;
    let pair = DrugPair::parse(&pair)?;

    let record = match explainer.lookup(&pair) {
        LookupOutcome::Found(record) => record.clone(),
        LookupOutcome::NoMatch => {
            println!("⚠️  {}", NO_MATCH_NOTICE);
            return Ok(());
        }
    };

    println!("🧪 Original Interaction Description:");
    println!("   {}", record.description);

    println!("\n📘 UMLS CUI Codes:");
    let coded = record.coded_drugs();
    if coded.is_empty() {
        println!("   (none)");
    }
    for (drug, cui) in coded {
        println!("   🧬 {} — CUI: {}", drug, cui);
        if definitions {
            match explainer.definition(cui).await {
                Ok(Some(def)) => println!("      {}", def.text),
                Ok(None) => println!("      No definition found."),
                Err(e) => println!("      ⚠️  {}", e),
            }
        }
    }

    if no_simplify {
        return Ok(());
    }

    let simplified = {
        let _spinner = Spinner::new("🔎 Simplifying...");
        explainer.simplify_record(&pair).await
    };

    match simplified {
        Ok(Some((_, text))) => {
            println!("\n🤖 Simplified Explanation:");
            println!("   {}", text);
        }
        Ok(None) => println!("⚠️  {}", NO_MATCH_NOTICE),
        Err(e) => println!("\n⚠️  {}", e),
    }

    Ok(())
}

/// Handle simplify command
pub async fn handle_simplify(config: &ExplainerConfig, text: String) -> anyhow::Result<()> {
    let explainer = Explainer::from_config(config)?;

    let result = {
        let _spinner = Spinner::new("🔎 Simplifying your input...");
        explainer.simplify_text(&text).await
    };

    match result {
        Ok(simplified) => {
            println!("🧠 Simplified Explanation:");
            println!("   {}", simplified);
        }
        Err(ExplainerError::EmptyInput) => println!("⚠️  {}", ExplainerError::EmptyInput),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Handle define command
pub async fn handle_define(config: &ExplainerConfig, cui: String) -> anyhow::Result<()> {
    let explainer = Explainer::from_config(config)?;

    match explainer.definition(&cui).await? {
        Some(def) => {
            match def.source {
                Some(source) => println!("{} ({}):", cui, source),
                None => println!("{}:", cui),
            }
            println!("   {}", def.text);
        }
        None => println!("No definition found for {}.", cui),
    }

    Ok(())
}

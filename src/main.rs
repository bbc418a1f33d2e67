use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

use survey_wizard::config::Config;
use survey_wizard::consent::consent_document;
use survey_wizard::links;
use survey_wizard::logging;
use survey_wizard::store::{Document, FileStore, StateStore};
use survey_wizard::submission::{
    BlockReason, Captcha, HttpSubmitter, SubmissionAggregator, SubmitOutcome,
};
use survey_wizard::validation::FormState;
use survey_wizard::wizard::definitions::{FINAL_STEP_PATH, THANK_YOU_PATH};
use survey_wizard::wizard::{survey_graph, ConfirmationScreen, NavigationError, Wizard};

#[derive(Parser)]
#[command(name = "survey-wizard")]
#[command(about = "Headless driver for the multi-step survey wizard")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Field values given on the command line
#[derive(Args, Debug, Default)]
struct AnswerArgs {
    /// Scalar field, `name=value` (`true`/`false` become booleans)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// List field, `name=a,b,c`
    #[arg(long = "list", value_name = "NAME=A,B")]
    list: Vec<String>,

    /// Recorded audio for a slot, `slot=path`
    #[arg(long = "record", value_name = "SLOT=PATH")]
    record: Vec<String>,

    /// Uploaded audio for a slot, `slot=path`
    #[arg(long = "upload", value_name = "SLOT=PATH")]
    upload: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every step and its links
    Steps,

    /// Validate the step graph
    Check,

    /// Print the stored answers
    Show,

    /// Show a step's form as it would be mounted
    Enter {
        path: String,

        /// Prefill parameter, `name=value`
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Answer a step and advance
    Answer {
        path: String,

        #[command(flatten)]
        answers: AnswerArgs,

        /// Prefill parameter, `name=value`
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Go back from a step
    Back { path: String },

    /// Clear all stored answers
    Reset,

    /// Answer the final step and send the whole survey
    Submit {
        /// Challenge token
        #[arg(long)]
        captcha: Option<String>,

        /// The challenge widget could not be loaded
        #[arg(long, conflicts_with = "captcha")]
        captcha_unavailable: bool,

        #[command(flatten)]
        answers: AnswerArgs,
    },

    /// Resolve the consent document for a country and language
    Consent { country: String, lang: String },

    /// Print the feedback form, problem report form and privacy policy links
    Links {
        /// Form language
        #[arg(long, default_value = links::FALLBACK_LANGUAGE)]
        lang: String,

        /// Privacy policy country
        #[arg(long, default_value = survey_wizard::consent::GLOBAL_COUNTRY)]
        country: String,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the local config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Steps => cmd_steps()?,
        Commands::Check => cmd_check()?,
        Commands::Show => cmd_show(&config)?,
        Commands::Enter { path, params } => cmd_enter(&config, &path, &params)?,
        Commands::Answer {
            path,
            answers,
            params,
        } => cmd_answer(&config, &path, &answers, &params)?,
        Commands::Back { path } => cmd_back(&config, &path)?,
        Commands::Reset => cmd_reset(&config)?,
        Commands::Submit {
            captcha,
            captcha_unavailable,
            answers,
        } => cmd_submit(&config, captcha, captcha_unavailable, &answers).await?,
        Commands::Consent { country, lang } => {
            let doc = consent_document(&config.consent.base_url, &country, &lang);
            println!("{}", doc.url);
        }
        Commands::Links { lang, country } => {
            println!("feedback: {}", links::feedback_form(&lang));
            println!("report-problem: {}", links::report_problem_form(&lang));
            println!("privacy-policy: {}", links::privacy_policy(&country));
        }
        Commands::Config { save } => {
            print!("{}", config.to_toml()?);
            if save {
                let path = config.save()?;
                eprintln!("Saved {}", path.display());
            }
        }
    }

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    Ok(())
}

fn open_wizard(config: &Config) -> Result<Wizard<FileStore>> {
    let graph = survey_graph().context("Step graph is invalid")?;
    let store = FileStore::open(config.store_file())
        .with_context(|| format!("Failed to open store {}", config.store_file().display()))?;
    Ok(Wizard::new(graph, store))
}

fn cmd_steps() -> Result<()> {
    let graph = survey_graph()?;
    println!("Survey steps ({})", graph.len());
    println!("{}", "─".repeat(60));
    for step in graph.steps() {
        let progress = step
            .props
            .metadata
            .progress()
            .map(|(c, t)| format!(" [{c}/{t}]"))
            .unwrap_or_default();
        println!("{}{}", step.path, progress);
        for (label, target) in step.links() {
            println!("    {label:<18} → {target}");
        }
    }
    Ok(())
}

fn cmd_check() -> Result<()> {
    match survey_graph() {
        Ok(graph) => {
            println!("Step graph OK ({} steps)", graph.len());
            Ok(())
        }
        Err(e) => bail!("{e}"),
    }
}

fn cmd_show(config: &Config) -> Result<()> {
    let store = FileStore::open(config.store_file())?;
    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    Ok(())
}

fn print_form(path: &str, form: &FormState) {
    println!("Step: {path}");
    for name in form.schema().field_names() {
        match form.get(name) {
            Some(value) => println!("  {name} = {value}"),
            None => println!("  {name} (unset)"),
        }
    }
    for (field, message) in form.result().messages() {
        println!("  ! {field}: {message}");
    }
    println!("Can continue: {}", form.can_advance());
}

fn cmd_enter(config: &Config, path: &str, params: &[String]) -> Result<()> {
    let mut wizard = open_wizard(config)?;
    let form = wizard.enter_with_params(path, &parse_params(params)?)?;
    print_form(path, &form);
    Ok(())
}

fn cmd_answer(config: &Config, path: &str, answers: &AnswerArgs, params: &[String]) -> Result<()> {
    let mut wizard = open_wizard(config)?;
    let mut form = wizard.enter_with_params(path, &parse_params(params)?)?;
    for (name, value) in collect_answers(answers)? {
        form.set_field(&name, value);
    }

    match wizard.submit_form(path, form) {
        Ok(transition) => {
            println!("{} → {}", transition.from, transition.to);
            if transition.to == THANK_YOU_PATH {
                let screen = ConfirmationScreen::enter(wizard.store_mut(), None)?;
                print_confirmation(&screen);
            }
            Ok(())
        }
        Err(NavigationError::Invalid(result)) => {
            for (field, message) in result.messages() {
                eprintln!("  {field}: {message}");
            }
            bail!("Step {path} is not complete")
        }
        Err(NavigationError::SubmitRequired(_)) => {
            bail!("Step {path} sends the survey; use `survey-wizard submit` instead")
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_back(config: &Config, path: &str) -> Result<()> {
    let mut wizard = open_wizard(config)?;
    wizard.enter(path)?;
    match wizard.go_back(path)? {
        Some(previous) => println!("{path} → {previous}"),
        None => println!("No previous step"),
    }
    Ok(())
}

fn cmd_reset(config: &Config) -> Result<()> {
    let mut store = FileStore::open(config.store_file())?;
    store.reset()?;
    println!("Cleared {}", store.path().display());
    Ok(())
}

async fn cmd_submit(
    config: &Config,
    captcha: Option<String>,
    captcha_unavailable: bool,
    answers: &AnswerArgs,
) -> Result<()> {
    let mut wizard = open_wizard(config)?;
    let mut form = wizard.enter(FINAL_STEP_PATH)?;
    for (name, value) in collect_answers(answers)? {
        form.set_field(&name, value);
    }

    let captcha = match (captcha, captcha_unavailable) {
        (Some(token), _) => Captcha::Token(token),
        (None, true) => Captcha::Unavailable,
        (None, false) => Captcha::Pending,
    };

    let submitter = HttpSubmitter::from_config(&config.submission)
        .context("Failed to build HTTP client")?;
    let mut aggregator = SubmissionAggregator::from_config(config);

    match aggregator
        .submit(wizard.store_mut(), &submitter, &form, captcha)
        .await
    {
        SubmitOutcome::Succeeded(nav) => {
            wizard.deactivate(FINAL_STEP_PATH);
            let screen = ConfirmationScreen::enter(wizard.store_mut(), Some(nav))?;
            print_confirmation(&screen);
            Ok(())
        }
        SubmitOutcome::Blocked(BlockReason::Invalid(result)) => {
            for (field, message) in result.messages() {
                eprintln!("  {field}: {message}");
            }
            bail!("Final step is not complete")
        }
        SubmitOutcome::Blocked(BlockReason::CaptchaRequired) => {
            bail!("A captcha token is required (--captcha, or --captcha-unavailable)")
        }
        SubmitOutcome::Failed(reason) => {
            bail!("{} ({})", reason.user_message(), reason.code())
        }
        SubmitOutcome::Ignored => Ok(()),
    }
}

fn print_confirmation(screen: &ConfirmationScreen) {
    match &screen.submission_id {
        Some(id) => println!("Thank you! Submission id: {id}"),
        None => println!("Thank you!"),
    }
}

fn split_pair(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{raw}'"))
}

fn parse_params(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|p| split_pair(p).map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}

fn scalar_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

fn audio_value(kind: &str, path: &str) -> Value {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    json!({ kind: { "path": path, "name": name } })
}

/// Turn command-line answers into form values
fn collect_answers(args: &AnswerArgs) -> Result<Document> {
    let mut values = Document::new();
    for raw in &args.set {
        let (name, value) = split_pair(raw)?;
        values.insert(name.to_string(), scalar_value(value));
    }
    for raw in &args.list {
        let (name, items) = split_pair(raw)?;
        let items: Vec<Value> = items
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect();
        values.insert(name.to_string(), Value::Array(items));
    }
    for (kind, entries) in [("recordingFile", &args.record), ("uploadedFile", &args.upload)] {
        for raw in entries {
            let (slot, path) = split_pair(raw)?;
            values.insert(slot.to_string(), audio_value(kind, path));
        }
    }
    Ok(values)
}

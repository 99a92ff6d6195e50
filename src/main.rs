#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use theme_sync::presentation::attribute_name;
use theme_sync::{
    Appearance, Config, Element, FileStore, FixedPreference, Host, KeyValueStore, Observer, Orchestrator,
    PresentationTarget, PropConfig, Selector, State, StorageEvent, Strategy,
};

/// Keep presentation properties in sync between storage and a presentation target
#[derive(Debug, Parser)]
#[command(name = "theme-sync", version)]
struct Cli {
    /// JSON configuration file (defaults to a system color mode)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON store file (defaults to the user config directory)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Appearance reported by the host preference
    #[arg(long, value_enum, default_value_t = Preference::Unsupported)]
    prefer: Preference,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the synchronized state
    Show,
    /// Set a property programmatically
    Set { prop: String, value: String },
    /// Replace the persisted entry as another context would
    EditStorage { raw: String },
    /// Change a presentation attribute as an external script would
    EditAttr { prop: String, value: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preference {
    Light,
    Dark,
    Unsupported,
}

impl From<Preference> for Option<Appearance> {
    fn from(preference: Preference) -> Self {
        match preference {
            Preference::Light => Some(Appearance::Light),
            Preference::Dark => Some(Appearance::Dark),
            Preference::Unsupported => None,
        }
    }
}

fn default_config() -> Config {
    Config::default()
        .with_observer(Observer::Storage)
        .with_observer(Observer::Attributes)
        .with_prop(
            "mode",
            PropConfig::mode(Strategy::system("system", "light"), &[Selector::ColorScheme, Selector::Class])
                .persisted(None),
        )
}

fn print_report(sync: &Orchestrator, element: &Element, store: &FileStore) {
    println!("state:");
    for (prop, value) in sync.state() {
        println!("  {prop} = {value}");
    }
    println!("attributes:");
    for (name, value) in element.attributes() {
        println!("  {name}=\"{value}\"");
    }
    println!("color-scheme: {}", element.color_scheme().unwrap_or_default());
    println!("class: {}", element.classes().join(" "));
    match sync.resolved_appearance() {
        Some(appearance) => println!("appearance: {appearance}"),
        None => println!("appearance: (no mode property)"),
    }
    println!("store: {}", store.path().display());
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path).context(format!("Failed to load config from {}", path.display()))?,
        None => default_config(),
    };

    let store = Rc::new(FileStore::new(cli.store.clone().unwrap_or_else(FileStore::default_path)));
    let element = Rc::new(Element::new());
    let oracle = Rc::new(FixedPreference::new(cli.prefer.into()));
    let sync = Orchestrator::new(
        &config,
        Host {
            store: store.clone(),
            target: element.clone(),
            oracle,
        },
    )
    .context("Invalid configuration")?;
    element.take_records();

    sync.subscribe(Rc::new(|state: &State| info!(state = ?state, "Subscriber notified")));

    match cli.command {
        Command::Show => {}
        Command::Set { prop, value } => {
            if !sync.update(&prop, &value) {
                warn!(prop = %prop, value = %value, "Update produced no change");
            }
        }
        Command::EditStorage { raw } => {
            let key = config.storage_key.clone();
            let old_value = store.get(&key);
            store
                .set(&key, &raw)
                .context(format!("Failed to write {}", store.path().display()))?;
            let event = StorageEvent {
                key: Some(key),
                old_value,
                new_value: Some(raw),
            };
            if !sync.handle_storage_event(&event) {
                warn!("Storage edit produced no change");
            }
        }
        Command::EditAttr { prop, value } => {
            element.set_attribute(&attribute_name(&prop), &value);
            if sync.handle_mutations(&element.take_records()) == 0 {
                warn!(prop = %prop, "Attribute edit produced no change");
            }
        }
    }

    print_report(&sync, &element, &store);
    Ok(())
}

//! labcheck CLI: seed course data and validate lab commands.
//!
//! - `labcheck seed` loads the dataset into the store
//! - `labcheck validate` runs the lab steps and prints the report
//! - `labcheck run` seeds the built-in course data and validates in one process
//! - `labcheck reset` drops the dataset's collections
//!
//! Commands run against a MongoDB server unless the config or `--store`
//! selects the embedded `memory` store.
//!
//! The exit code reports infrastructure problems only. A run with failing
//! lab commands still exits 0; the report says whether the labs are ready.

mod commands;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use labcheck_core::{LabcheckConfig, StoreBackend, CONFIG_FILE_NAME};
use labcheck_runner::{course_registry, Runner};
use labcheck_seeder::{course, Dataset, Seeder};
use labcheck_store::{DocumentStore, MemoryStore, MongoStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::build_cli;

fn main() {
    let matches = build_cli().get_matches();
    if let Err(e) = run(&matches) {
        eprintln!("(error) {:#}", e);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    init_tracing(&config.log_level);
    let backend = Backend::open(matches, &config)?;

    match matches.subcommand() {
        Some(("seed", sub)) => seed(&backend, &load_dataset(sub)?),
        Some(("validate", sub)) => validate(backend.store(), &config, sub),
        Some(("run", sub)) => {
            seed(&backend, course())?;
            validate(backend.store(), &config, sub)
        }
        Some(("reset", sub)) => reset(&backend, &load_dataset(sub)?),
        Some((other, _)) => Err(anyhow!("unknown command '{}'", other)),
        None => Err(anyhow!("no command given")),
    }
}

/// The store selected by the config and the global flags.
enum Backend {
    Mongo(MongoStore),
    Memory(MemoryStore),
}

impl Backend {
    fn open(matches: &ArgMatches, config: &LabcheckConfig) -> Result<Self> {
        let kind = match matches.get_one::<String>("store") {
            Some(name) => name.parse::<StoreBackend>()?,
            None => config.store,
        };
        match kind {
            StoreBackend::Mongodb => {
                let uri = matches
                    .get_one::<String>("uri")
                    .cloned()
                    .unwrap_or_else(|| config.uri.clone());
                let store = MongoStore::connect(&uri, &config.database)
                    .with_context(|| format!("failed to connect to MongoDB at '{}'", uri))?;
                Ok(Backend::Mongo(store))
            }
            StoreBackend::Memory => {
                let data_file = matches
                    .get_one::<String>("data")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| config.data_file.clone());
                let store = MemoryStore::open(&data_file).with_context(|| {
                    format!("failed to open data file '{}'", data_file.display())
                })?;
                Ok(Backend::Memory(store))
            }
        }
    }

    fn store(&self) -> &dyn DocumentStore {
        match self {
            Backend::Mongo(store) => store,
            Backend::Memory(store) => store,
        }
    }

    /// Persist seed and reset results. Server writes are already durable.
    fn persist(&self) -> Result<()> {
        match self {
            Backend::Mongo(_) => Ok(()),
            Backend::Memory(store) => store.flush().context("failed to write data file"),
        }
    }
}

fn load_config(matches: &ArgMatches) -> Result<LabcheckConfig> {
    let path = match matches.get_one::<String>("config") {
        Some(path) => PathBuf::from(path),
        None => {
            let path = PathBuf::from(CONFIG_FILE_NAME);
            LabcheckConfig::write_default_if_missing(&path)?;
            path
        }
    };
    LabcheckConfig::load_or_default(&path)
        .with_context(|| format!("failed to load config '{}'", path.display()))
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_dataset(sub: &ArgMatches) -> Result<Dataset> {
    match sub.get_one::<String>("dataset") {
        Some(path) => Dataset::from_json_file(Path::new(path))
            .with_context(|| format!("failed to load dataset '{}'", path)),
        None => Ok(course().clone()),
    }
}

fn seed(backend: &Backend, dataset: &Dataset) -> Result<()> {
    let summary = Seeder::seed(backend.store(), dataset).context("seeding failed")?;
    backend.persist()?;
    println!("Seeded {} collection(s):", summary.collections.len());
    println!("{}", summary);
    Ok(())
}

fn validate(store: &dyn DocumentStore, config: &LabcheckConfig, sub: &ArgMatches) -> Result<()> {
    let labs: Vec<String> = match sub.get_many::<String>("lab") {
        Some(labs) => labs.cloned().collect(),
        None => config.labs.clone(),
    };
    let registry = course_registry()?;
    let steps = registry.select(&labs)?;

    if config.reseed_before_validate {
        Seeder::seed(store, course()).context("reseeding before validate failed")?;
    }

    info!(target: "labcheck::runner", steps = steps.len(), "Starting validation");
    let mut runner = Runner::new(config.truncate_at);
    let report = runner.run(store, steps);
    let text = runner.report(&report);

    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn reset(backend: &Backend, dataset: &Dataset) -> Result<()> {
    let dropped = Seeder::reset(backend.store(), dataset).context("reset failed")?;
    backend.persist()?;
    println!("Dropped {} collection(s)", dropped);
    Ok(())
}

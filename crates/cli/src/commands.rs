//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("labcheck")
        .about("Seed and validate document-database course labs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Config file (default: labcheck.toml)")
                .global(true),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("BACKEND")
                .value_parser(["mongodb", "memory"])
                .help("Store to use (default: store from the config)")
                .global(true),
        )
        .arg(
            Arg::new("uri")
                .long("uri")
                .value_name("URI")
                .help("MongoDB connection string (default: uri from the config)")
                .global(true),
        )
        .arg(
            Arg::new("data")
                .long("data")
                .value_name("PATH")
                .help("Snapshot file of the memory store (default: data_file from the config)")
                .global(true),
        )
        .subcommand(build_seed())
        .subcommand(build_validate())
        .subcommand(build_run())
        .subcommand(build_reset())
}

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .long("dataset")
        .value_name("FILE")
        .help("JSON dataset to use instead of the built-in course data")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print the report as JSON")
        .action(ArgAction::SetTrue)
}

fn lab_arg() -> Arg {
    Arg::new("lab")
        .long("lab")
        .value_name("NAME")
        .help("Only run this lab (repeatable; default: labs from the config)")
        .action(ArgAction::Append)
}

fn build_seed() -> Command {
    Command::new("seed")
        .about("Load the dataset, replacing its collections")
        .arg(dataset_arg())
}

fn build_validate() -> Command {
    Command::new("validate")
        .about("Run the lab steps against the stored data and print the report")
        .arg(json_arg())
        .arg(lab_arg())
}

fn build_run() -> Command {
    Command::new("run")
        .about("Seed the built-in course data, then validate")
        .arg(json_arg())
        .arg(lab_arg())
}

fn build_reset() -> Command {
    Command::new("reset")
        .about("Drop every collection of the dataset")
        .arg(dataset_arg())
}

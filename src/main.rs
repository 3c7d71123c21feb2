use clap::Parser;
use std::process;
use wbconfig_processor::cli::{args::Args, commands};

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is given
fn show_help_and_commands() {
    println!("Water Balance Configuration Processor");
    println!("=====================================");
    println!();
    println!("Exchange water balance configurations (areas, buckets, structures) with");
    println!("external hydrological modeling tools through their legacy DBF tables.");
    println!();
    println!("USAGE:");
    println!("    wbconfig-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    export      Export configurations to DBF tables");
    println!("    import      Import one configuration from DBF tables");
    println!("    validate    Run one validation cycle over the submission queue");
    println!("    status      Report store and queue contents");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Export one organization's tables into the current directory:");
    println!("    wbconfig-processor export --organization Waternet --areas");
    println!();
    println!("    # Export a single configuration by ident:");
    println!("    wbconfig-processor export --ident GAF42 -o /tmp/exchange");
    println!();
    println!("    # Import a delivered configuration:");
    println!("    wbconfig-processor import --area aanafvoer_waterbalans.dbf \\");
    println!("                              --buckets grondwatergebieden.dbf \\");
    println!("                              --structures pumpingstations.dbf");
    println!();
    println!("    # Validate pending submissions:");
    println!("    wbconfig-processor validate --organization Waternet");
    println!();
    println!("For detailed help on any command, use:");
    println!("    wbconfig-processor <COMMAND> --help");
}

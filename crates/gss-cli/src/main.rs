use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use gss_core::ScriptOpts;

#[derive(Parser, Debug)]
#[command(
    name = "gss-cli",
    about = "Import, inspect and re-export GearSwap gear sets",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a script (or every script under a directory) and print its sets as JSON
    Dump(DumpArgs),
    /// Re-emit a script with its sets, optionally replaced by an edited JSON dump
    Export(ExportArgs),
    /// List the job scripts under a directory
    List(ListArgs),
    /// Print the default option of each state mode
    Modes(ModesArgs),
}

#[derive(ClapArgs, Debug, Clone)]
struct OptsArgs {
    /// Root table set paths start with
    #[arg(long, default_value = "sets", value_parser = clap::builder::NonEmptyStringValueParser::new())]
    root: String,
    /// Function that derives a set from a base set
    #[arg(long, default_value = "set_combine")]
    combine_fn: String,
    /// Function new sets are appended to
    #[arg(long, default_value = "init_gear_sets")]
    init_fn: String,
}

impl OptsArgs {
    fn to_opts(&self) -> ScriptOpts {
        ScriptOpts {
            root: self.root.clone(),
            combine_fn: self.combine_fn.clone(),
            init_fn: self.init_fn.clone(),
            ..ScriptOpts::default()
        }
    }
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    /// Script file or directory
    path: PathBuf,
    /// Print import diagnostics to stderr
    #[arg(long, default_value_t = false)]
    diagnostics: bool,
    /// Dump the whole edit session (active set, character, job, modes) instead of just the sets
    #[arg(long, default_value_t = false)]
    workbook: bool,
    #[command(flatten)]
    opts: OptsArgs,
}

#[derive(ClapArgs, Debug)]
struct ExportArgs {
    /// Script to re-emit
    script: PathBuf,
    /// JSON dump (from `dump`) holding the sets to write
    #[arg(long, value_name = "JSON")]
    sets: Option<PathBuf>,
    /// Optional output path; otherwise prints to stdout
    #[arg(long)]
    out: Option<PathBuf>,
    /// Zip the output file before overwriting it
    #[arg(long, default_value_t = false)]
    backup: bool,
    #[command(flatten)]
    opts: OptsArgs,
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
    /// Directory to search
    dir: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct ModesArgs {
    /// Script file
    script: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Export(a) => cmd_export(a),
        Cmd::List(a) => cmd_list(a),
        Cmd::Modes(a) => cmd_modes(a),
    }
}

fn cmd_dump(args: DumpArgs) {
    let p = args.path.as_path();
    if p.is_dir() {
        match gss_core::json::dump_dir_map_json(p) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(2);
            }
        }
        return;
    }

    if args.workbook {
        let (wb, logs) = gss_core::scripts::load_workbook(p).unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            std::process::exit(2);
        });
        if args.diagnostics {
            print_diagnostics(&logs);
        }
        match gss_core::json::workbook_to_json(&wb) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(3);
            }
        }
        return;
    }

    let text = gss_core::scripts::read_script(p).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    let result = gss_core::parse_with(&text, &args.opts.to_opts());
    if args.diagnostics {
        print_diagnostics(&result.diagnostics);
    }
    match gss_core::json::sets_to_json(&result) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(3);
        }
    }
}

fn print_diagnostics(logs: &[gss_core::LogEntry]) {
    for d in logs {
        eprintln!(
            "{:?}\t{}{}",
            d.status,
            d.message,
            d.path.as_deref().map(|p| format!("\t({})", p)).unwrap_or_default()
        );
    }
}

fn cmd_export(args: ExportArgs) {
    let opts = args.opts.to_opts();
    let text = gss_core::scripts::read_script(&args.script).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    let (sets, base_sets) = match &args.sets {
        Some(json_path) => {
            let data = gss_core::scripts::read_script(json_path).unwrap_or_else(|e| {
                eprintln!("error reading JSON: {}", e);
                std::process::exit(2);
            });
            let dump = gss_core::json::sets_from_json(&data).unwrap_or_else(|e| {
                eprintln!("error: {}", e);
                std::process::exit(3);
            });
            (dump.sets, dump.base_sets)
        }
        None => {
            let parsed = gss_core::parse_with(&text, &opts);
            (parsed.sets, parsed.base_sets)
        }
    };
    log::debug!("exporting {} sets ({} combined)", sets.len(), base_sets.len());
    let output = gss_core::generate_with(&text, &sets, &base_sets, &opts);

    let Some(out) = args.out else {
        print!("{}", output);
        return;
    };
    if args.backup && out.is_file() {
        match gss_core::scripts::backup_script(&out) {
            Ok(zip) => eprintln!("backup: {}", zip.display()),
            Err(e) => {
                eprintln!("backup error: {}", e);
                std::process::exit(4);
            }
        }
    }
    gss_core::scripts::write_script(&out, &output).unwrap_or_else(|e| {
        eprintln!("error writing: {}", e);
        std::process::exit(5);
    });
}

fn cmd_list(args: ListArgs) {
    let scripts = gss_core::scripts::list_scripts(&args.dir).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    for p in scripts {
        let info = p
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(gss_core::scripts::character_info);
        match info {
            Some((name, job)) => println!("{}\t{}\t{}", p.display(), name, job),
            None => println!("{}", p.display()),
        }
    }
}

fn cmd_modes(args: ModesArgs) {
    let text = gss_core::scripts::read_script(&args.script).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    let modes = gss_core::scan_modes(&text);
    println!(
        "{}",
        serde_json::to_string_pretty(&modes).unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            std::process::exit(3);
        })
    );
}

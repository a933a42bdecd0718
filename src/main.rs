//! longhorn-probe CLI entry point
//!
//! Smoke tests for Longhorn storage on Talos Kubernetes clusters.

use longhorn_probe::cli::args::{Args, CheckArgs, Command};
use longhorn_probe::cli::output::get_formatter;
use longhorn_probe::commands::{list, templates};
use longhorn_probe::config::ProbeSettings;
use longhorn_probe::engine::result::ValidationReport;
use longhorn_probe::version::get_build_info;
use longhorn_probe::{logging, run_probe, ProbeConfig, ProbeError};

use std::process::ExitCode;

/// Exit status for errors that prevent a report from being produced
const EXIT_RUNTIME_ERROR: u8 = 3;

fn main() -> ExitCode {
    let args = Args::parse_checked();
    logging::init(args.verbose);

    match args.command() {
        Command::Version => {
            println!("{}", get_build_info());
            ExitCode::SUCCESS
        }
        Command::List => {
            print!("{}", list::render_check_list());
            ExitCode::SUCCESS
        }
        Command::Templates(t) => finish(&args, templates::run(&t.dir)),
        Command::Check(check) => finish(&args, run_checks(&args, &check)),
    }
}

fn run_checks(args: &Args, check: &CheckArgs) -> Result<ValidationReport, ProbeError> {
    let mut settings = ProbeSettings::load(args.config.as_deref())?;
    check.apply_to(&mut settings);
    settings.validate()?;

    run_probe(&ProbeConfig::from_args(check), &settings)
}

fn finish(args: &Args, result: Result<ValidationReport, ProbeError>) -> ExitCode {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let formatter = get_formatter(args.format, args.color_enabled(), args.verbose > 0, args.quiet);
    println!("{}", formatter.format(&report));

    ExitCode::from(report.exit_code())
}

use std::{error::Error, process::ExitCode};

use clap::Parser;
use vendor_verify::{
    cli::args::CliArgs, config::VendorVerifyConfig, Outcome, VendorVerify,
};

fn main() -> ExitCode {
    let cli_args: CliArgs = CliArgs::parse();

    let default_filter = if cli_args.verbose {
        "info,vendor_verify=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli_args) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli_args: CliArgs) -> Result<Outcome, Box<dyn Error>> {
    let config = VendorVerifyConfig::load()?;

    let mut builder = VendorVerify::builder()
        .manifest_path(cli_args.manifest)
        .vendor_directory(cli_args.vendor)
        .repair(cli_args.fix);
    if let Some(cache_directory) = cli_args.cache.or(config.cache_dir) {
        builder = builder.cache_directory(cache_directory);
    }
    if let Some(jobs) = cli_args.jobs.or(config.jobs) {
        builder = builder.jobs(jobs);
    }

    let vendor_verify = builder.try_build()?;
    let stdout = std::io::stdout();
    let outcome = vendor_verify.verify(&mut stdout.lock())?;
    Ok(outcome)
}

use std::env;
use std::process;

use anyhow::Context;
use log::LevelFilter;
use structopt::StructOpt;

use rtlimage::rtl::{self, AddressCheck, Options, Report};

mod cli;

fn print_report(report: &Report) {
    let saved = report
        .saved
        .iter()
        .chain(report.ota.iter().flat_map(|ota| ota.images.iter()));

    for image in saved {
        println!(
            "Segment at {:#010x}, size {:#010x} save to {}",
            image.address,
            image.size,
            image.path.display()
        );
    }

    println!(
        "Images size: Flash {} bytes, Ram {} bytes [{}]",
        report.usage.flash,
        report.usage.sram,
        report.usage.total()
    );
}

fn run(opts: cli::Opts) -> Result<(), anyhow::Error> {
    let options = Options {
        input: opts.elffile,
        outdir: opts.outdir.unwrap_or_default(),
        ota: opts.ota,
        address_check: if opts.strict_address {
            AddressCheck::Strict
        } else {
            AddressCheck::Compatible
        },
    };

    let report = rtl::elf2image(&options).with_context(|| {
        format!(
            "Failed to convert ELF file '{}'",
            options.input.display()
        )
    })?;

    print_report(&report);

    Ok(())
}

fn main() {
    // Log warnings and errors with a timestamp, unless RUST_LOG says otherwise
    let mut logger = pretty_env_logger::formatted_timed_builder();

    logger.filter_level(LevelFilter::Warn);

    if let Ok(filters) = env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }

    logger.init();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();

    println!("RtlBImages Utility version {}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(opts) {
        let code = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<rtlimage::Error>())
            .map_or(1, |err| err.exit_code());

        eprintln!("\nA fatal error occurred: {:#}", err);

        process::exit(code);
    }
}

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use ringcopy::{CopyConfig, CopyError, FileCopy, WriteErrorPolicy};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit status for usage, open and allocation errors.
const EXIT_SETUP_FAILURE: i32 = -1;

#[derive(Parser, Debug)]
#[command(
    name = "ringcopy",
    version,
    about = "Block-level copy from one file to another, much like `dd`, with a live status line",
    long_about = "`ringcopy` performs a block-level copy from one file or device to another, much like `dd`.

A reader thread fills a ring of fixed-size blocks while a writer thread drains it, so reading and \
writing overlap. A status line shows how much has been read and written and how often each side \
had to wait for the other.

total buffer size in bytes = block size * number of blocks

EXAMPLES:
    # Image a device with the default 10 x 1 MiB ring
    ringcopy /dev/sdb disk.img

    # Larger ring of 4 MiB blocks
    ringcopy -s 4194304 -b 16 disk.img /dev/sdc"
)]
struct Args {
    /// Size (in bytes) of each block
    #[arg(
        short = 's',
        long = "block-size",
        value_name = "BYTES",
        default_value_t = ringcopy::DEFAULT_BLOCK_SIZE,
        value_parser = parse_positive
    )]
    block_size: usize,

    /// Number of blocks in the buffer
    #[arg(
        short = 'b',
        long = "blocks",
        value_name = "N",
        default_value_t = ringcopy::DEFAULT_CAPACITY,
        value_parser = parse_positive
    )]
    blocks: usize,

    /// Delay between status line updates, in milliseconds
    #[arg(
        short = 'i',
        long,
        value_name = "MS",
        default_value_t = 125,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    progress_interval: u64,

    /// Do not print the status line
    #[arg(short = 'q', long)]
    quiet: bool,

    /// What to do when writing the output fails
    #[arg(long, value_enum, value_name = "POLICY", default_value_t = OnWriteError::Abort)]
    on_write_error: OnWriteError,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// File or device to read
    input: PathBuf,

    /// File or device to write (created or truncated)
    output: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OnWriteError {
    /// Stop the copy at the first write error
    Abort,
    /// Report the error and keep copying
    Continue,
}

impl From<OnWriteError> for WriteErrorPolicy {
    fn from(value: OnWriteError) -> Self {
        match value {
            OnWriteError::Abort => Self::Abort,
            OnWriteError::Continue => Self::Continue,
        }
    }
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = CopyConfig::new(args.block_size, args.blocks)
        .with_progress_interval(Duration::from_millis(args.progress_interval))
        .with_write_error_policy(args.on_write_error.into());

    let context = || {
        format!(
            "failed to copy {} to {}",
            args.input.display(),
            args.output.display()
        )
    };

    // Nothing is announced until both files are open and the ring exists.
    let copy = FileCopy::open(&args.input, &args.output, &config).with_context(context)?;
    println!(
        "Starting block-level copy from \"{}\" to \"{}\" with buffer: {} (blocks), block: {} (bytes)",
        args.input.display(),
        args.output.display(),
        config.capacity,
        config.block_size
    );

    let mut stdout = io::stdout();
    let progress: Option<&mut (dyn Write + Send)> = if args.quiet {
        None
    } else {
        Some(&mut stdout)
    };
    let result = copy.run(progress);
    if !args.quiet {
        // Terminate the status line.
        println!();
    }

    let report = result.with_context(context)?;
    println!(
        "Completed in {:.2} seconds",
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version are reported through the same path.
            let code = if err.use_stderr() { EXIT_SETUP_FAILURE } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_tracing(args.verbose);

    if let Err(err) = run(&args) {
        eprintln!("{err:#}");
        let code = err
            .downcast_ref::<CopyError>()
            .map_or(1, CopyError::exit_code);
        std::process::exit(code);
    }
}

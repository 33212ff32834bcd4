//! hap-verify - check that a paired HomeKit accessory still proves its identity.

mod discovery;
mod transport;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hap_pairing::{run_pair_verify, ControllerIdentity, FileKeyStore, VerifyController};

use transport::HttpTransport;

/// Command-line arguments
struct Args {
    /// Browse for accessories instead of verifying one
    discover: bool,
    /// Browse duration, and per-exchange I/O timeout
    timeout: Duration,
    /// Controller identity file
    identity: PathBuf,
    /// Accessory key store (JSON)
    keystore: PathBuf,
    /// Identifier for a newly generated controller identity
    controller_id: Option<String>,
    debug: bool,
    /// `HOST:PORT`
    target: Option<String>,
    /// Handle to look up in the key store
    accessory: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            discover: false,
            timeout: Duration::from_secs(5),
            identity: PathBuf::from("controller.id"),
            keystore: PathBuf::from("accessories.json"),
            controller_id: None,
            debug: false,
            target: None,
            accessory: None,
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut positional = Vec::new();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--discover" => {
                args.discover = true;
            }
            "--timeout" | "-t" => match iter.next().and_then(|s| s.parse().ok()) {
                Some(secs) => args.timeout = Duration::from_secs(secs),
                None => usage_error("--timeout needs a number of seconds"),
            },
            "--identity" | "-i" => match iter.next() {
                Some(path) => args.identity = PathBuf::from(path),
                None => usage_error("--identity needs a path"),
            },
            "--keystore" | "-k" => match iter.next() {
                Some(path) => args.keystore = PathBuf::from(path),
                None => usage_error("--keystore needs a path"),
            },
            "--id" => match iter.next() {
                Some(id) => args.controller_id = Some(id),
                None => usage_error("--id needs a name"),
            },
            "--debug" | "-d" => {
                args.debug = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ if arg.starts_with('-') => usage_error(&format!("Unknown argument: {}", arg)),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    args.target = positional.next();
    args.accessory = positional.next();
    if positional.next().is_some() {
        usage_error("too many arguments");
    }

    args
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!("hap-verify - run HomeKit pair-verify against a paired accessory");
    println!();
    println!("Usage: hap-verify [OPTIONS] HOST:PORT ACCESSORY_ID");
    println!("       hap-verify --discover [--timeout SECS]");
    println!();
    println!("Options:");
    println!("      --discover           Browse for _hap._tcp accessories and exit");
    println!("  -t, --timeout SECS       Browse time / I/O timeout (default: 5)");
    println!("  -i, --identity PATH      Controller identity file (default: controller.id)");
    println!("  -k, --keystore PATH      Accessory key store (default: accessories.json)");
    println!("      --id NAME            Identifier for a newly created identity");
    println!("  -d, --debug              Enable debug logging");
    println!("  -h, --help               Show this help message");
}

fn setup_logging(args: &Args) {
    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(args.debug)
        .with_max_level(level)
        .init();
}

fn load_identity(args: &Args) -> Result<ControllerIdentity> {
    ControllerIdentity::load_or_generate(&args.identity, args.controller_id.as_deref())
        .with_context(|| format!("loading identity {}", args.identity.display()))
}

async fn discover(args: &Args) -> Result<()> {
    let duration = args.timeout;
    let found = tokio::task::spawn_blocking(move || discovery::browse(duration)).await??;

    if found.is_empty() {
        println!("No accessories found after {} seconds", duration.as_secs());
    }
    for accessory in found {
        println!("{}", accessory);
    }
    Ok(())
}

async fn verify(args: &Args) -> Result<()> {
    let (Some(target), Some(handle)) = (&args.target, &args.accessory) else {
        bail!("expected HOST:PORT ACCESSORY_ID (see --help)");
    };

    let identity = load_identity(args)?;
    let store = FileKeyStore::open(&args.keystore)
        .with_context(|| format!("reading key store {}", args.keystore.display()))?;
    let controller = VerifyController::for_accessory(identity, &store, handle)?;

    let mut transport = HttpTransport::connect(target, args.timeout).await?;
    run_pair_verify(controller, &mut transport).await?;

    println!("{} at {} verified", handle, target);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    setup_logging(&args);

    if args.discover {
        discover(&args).await
    } else {
        verify(&args).await
    }
}

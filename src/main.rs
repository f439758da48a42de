use tracing::{error, warn};

use gmgn_scout::tools::volume;
use gmgn_scout::types::RunRecord;
use gmgn_scout::ScoutConfig;

struct CliArgs {
    symbols: Vec<String>,
    headless: bool,
    save: bool,
}

fn print_usage() {
    eprintln!("gmgn-scout: token market-data collector for gmgn.ai");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    gmgn-scout [OPTIONS] <chain/token>...");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --headless    run the browser without a visible window");
    eprintln!("    --no-save     skip writing the run record JSON");
    eprintln!("    -h, --help    show this help");
    eprintln!();
    eprintln!("Targets use the chain/token form, e.g.");
    eprintln!("    gmgn-scout bsc/0xe6df05ce8c8301223373cf5b969afcb1498c5528");
}

fn parse_cli_args() -> CliArgs {
    let mut symbols = Vec::new();
    let mut headless = false;
    let mut save = true;

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--headless" => headless = true,
            "--no-save" => save = false,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("unknown option: {}", other);
                print_usage();
                std::process::exit(2);
            }
            _ => symbols.push(a),
        }
    }

    CliArgs {
        symbols,
        headless,
        save,
    }
}

fn print_report(record: &RunRecord) {
    for report in &record.data {
        println!("\n=== {} ===", report.symbol);
        match (&report.data, &report.error) {
            (Some(result), _) => {
                println!(
                    "status: {} ({}ms)",
                    result.status.as_str(),
                    report.duration_ms
                );
                if let Some(err) = &result.error {
                    println!("error: {}", err);
                }
                for (field, value) in &result.fields {
                    println!("    {}: {}", field, value);
                }
            }
            (None, Some(err)) => {
                println!("status: failed ({}ms)", report.duration_ms);
                println!("error: {}", err);
            }
            (None, None) => println!("status: failed ({}ms)", report.duration_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = parse_cli_args();
    if cli.symbols.is_empty() {
        eprintln!("error: no targets given");
        print_usage();
        std::process::exit(2);
    }

    // Reject malformed targets before any browser work happens.
    for symbol in &cli.symbols {
        if let Err(e) = volume::Target::parse(symbol) {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }

    let mut cfg = ScoutConfig::load();
    if cli.headless {
        cfg.headless = true;
    }

    let record = match volume::collect_batch(&cfg, &cli.symbols).await {
        Ok(record) => record,
        Err(e) => {
            error!("session failed: {}", e);
            std::process::exit(1);
        }
    };

    print_report(&record);
    println!(
        "\n{}/{} targets extracted, {} failed",
        record.successful(),
        record.symbols.len(),
        record.failed()
    );

    if cli.save {
        match volume::save_run_record(&cfg, &record) {
            Ok(path) => println!("\nrun record: {}", path.display()),
            Err(e) => {
                error!("could not save run record: {}", e);
                std::process::exit(1);
            }
        }
    }

    if !record.any_usable() {
        warn!("no usable data extracted for any target");
        std::process::exit(1);
    }

    Ok(())
}

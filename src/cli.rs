//! Command-line argument parsing for Storewatch

/// Parse command line arguments
pub struct Args {
    pub validate: bool,
    pub help: bool,
    /// Copy the finished report to this path in addition to the reports dir
    pub out: Option<String>,
    /// Override the reference "now" instant (default: latest observation)
    pub now: Option<String>,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    parse_args_internal(&args)
}

pub fn parse_args_internal(args: &[String]) -> Args {
    let mut result = Args {
        validate: false,
        help: false,
        out: None,
        now: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--out" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.out = Some(args[i].clone());
                }
            }
            "--now" => {
                if i + 1 < args.len() {
                    i += 1;
                    result.now = Some(args[i].clone());
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("Storewatch - store uptime/downtime report engine\n");
    println!("USAGE:");
    println!("    storewatch [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --validate          Validate configuration and exit");
    println!("    --out PATH          Also copy the finished report CSV to PATH");
    println!("    --now TIMESTAMP     Reference instant (e.g. '2023-01-25 18:13:22 UTC');");
    println!("                        defaults to the latest observation in the data");
    println!("    --help, -h          Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    STORE_STATUS_CSV, BUSINESS_HOURS_CSV, TIMEZONES_CSV,");
    println!("    REPORTS_DIR, DEFAULT_TIMEZONE (see .env.example)");
}

fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = scrapkeep::cli::Args::parse();
    scrapkeep::logging::init(args.quiet);
    if let Err(e) = scrapkeep::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}

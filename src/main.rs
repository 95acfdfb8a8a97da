fn main() -> anyhow::Result<()> {
    // Load .env file if it exists; configuration is read from the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    keyplane::cli::run_cli()
}

/// Loupe command-line front end
///
/// Transpile, run and patch component files without the editor UI.

use loupe_core::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

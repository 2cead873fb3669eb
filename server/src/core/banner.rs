//! Startup banner

use super::constants::APP_NAME;

/// Print the startup banner with the API address
pub fn print_banner(host: &str, port: u16, database_path: &str) {
    let display_host = if host == "0.0.0.0" || host == "::" {
        "localhost"
    } else {
        host
    };

    const W: usize = 10;

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m http://{}:{}/api/v1",
        "API:", display_host, port
    );
    println!(
        "  \x1b[90m➜  {:<W$} {}\x1b[0m",
        "Database:", database_path
    );
    println!();
}

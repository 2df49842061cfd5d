/*!
 * fogo Server Entry Point
 *
 * Starts the key-value server: logging, configuration from the command
 * line (one optional positional argument, the TCP port), signal handlers,
 * then the event loop until SIGINT/SIGTERM.
 */

use anyhow::Result;
use fogo::{install_signal_handlers, Config, Server};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    // RUST_LOG=debug fogo 6379
    env_logger::init();

    let config = Config::from_args(std::env::args())?;
    let port = config.port;

    install_signal_handlers();

    let mut server = Server::new(config)?;
    println!("fogo running on port {}", port);
    server.run()?;

    println!("fogo shut down.");
    Ok(())
}

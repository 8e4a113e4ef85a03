use clap::Parser;

use lib_livedata::access::subscribe::subscribe;
use lib_livedata::configs::EndpointConfig;

/// A simple CLI tool that follows a collection's change stream and prints
/// each notification as a JSON line.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Opens a real-time subscription to a collection and prints every change notification as one JSON object per line. Reconnects automatically; stop with Ctrl-C."
)]
struct Args {
    /// Endpoint settings (also settable via LIVEDATA_* env vars or a JSON file).
    #[clap(flatten)]
    endpoint: EndpointConfig,

    /// Name of the collection to watch.
    #[arg(short, long)]
    collection: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings = match EndpointConfig::load_with(args.endpoint)?.resolved() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let mut subscription = subscribe(&settings.ws_url, settings.credential.clone(), &args.collection)?;
    log::info!("Watching '{}' on {}", args.collection, settings.ws_url);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, unsubscribing");
                subscription.unsubscribe();
                break;
            }
            event = subscription.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            }
        }
    }

    Ok(())
}

use tracing_subscriber;

use clap::{App, Arg};

use raintree::server::{node, Settings};
use raintree::Result;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_level(false)
        .with_target(false)
        .without_time()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("raintree")
        .version("0.1")
        .about("Runs a RainTree gossip node, broadcasting each line read from stdin")
        .arg(
            Arg::with_name("listener-address")
                .short("a")
                .long("listener-address")
                .value_name("LISTENER_ADDRESS")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("service-url")
                .short("u")
                .long("service-url")
                .value_name("SERVICE_URL")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("secret-key")
                .short("k")
                .long("secret-key")
                .value_name("SECRET_KEY")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("peer")
                .short("p")
                .long("peer")
                .value_name("PUBKEY@HOST:PORT")
                .multiple(true)
                .takes_value(true),
        )
        .get_matches();

    let mut settings = Settings::new()?;
    if let Some(listener_address) = matches.value_of("listener-address") {
        settings.listener_address = listener_address.to_owned();
        settings.service_url = listener_address.to_owned();
    }
    if let Some(service_url) = matches.value_of("service-url") {
        settings.service_url = service_url.to_owned();
    }
    if let Some(secret_key) = matches.value_of("secret-key") {
        settings.secret_key = secret_key.to_owned();
    }
    if let Some(peers) = matches.values_of("peer") {
        settings.peers.extend(peers.map(String::from));
    }

    let sys = actix::System::new();
    sys.block_on(node::run(settings))
}

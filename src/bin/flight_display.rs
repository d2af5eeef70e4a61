use clap::Parser;
use tracing::error;

use flight_finder::client::{DisplayClient, show_secrets_error};
use flight_finder::config::{ClientConfig, Secrets};
use flight_finder::display::Palette;
use flight_finder::display::svg_panel::SvgPanel;
use flight_finder::network::HostLink;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    flight_finder::init_tracing();
    let config = ClientConfig::parse();

    let mut panel = SvgPanel::new(&config.panel_out, config.panel_scale);

    let secrets = match Secrets::load(&config.secrets) {
        Ok(secrets) => secrets,
        Err(e) => {
            error!("cannot use {:?}: {}", config.secrets, e);
            show_secrets_error(&mut panel, &Palette::new(config.bright), &e)?;
            return Err(e.into());
        }
    };

    let mut client = DisplayClient::new(config, secrets, panel, HostLink::default())?;
    client.run().await;
    Ok(())
}

//! `wpa_supplicant` MQTT bridge binary: wires configuration, the
//! control-socket transport, and the MQTT client into a running
//! [`linebridge::core::Core`].

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use linebridge::config::{BridgeConfig, Cli, Commands};
use linebridge::core::{BridgeKind, Core};
use linebridge::mqtt::Mqtt;
use linebridge::transport::unix_dgram::SupplicantTransport;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let base = BridgeConfig::load_or_default().context("loading configuration")?;
    let cfg = cli.command.apply_over(base);

    let Commands::Run { device: iface, .. } = &cli.command else {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building current-thread runtime")?;

    rt.block_on(async move {
        info!("connecting to wpa_supplicant control socket for {iface}");
        let transport = SupplicantTransport::open(iface).context("opening supplicant transport")?;

        let client_id = format!("wpa-mqtt-bridge-{}-{}", iface, std::process::id());
        let mqtt = Mqtt::connect(&cfg.broker_host, cfg.broker_port, &client_id);
        let base_topic = format!("net/{iface}");
        for suffix in ["ssid/+", "ssid/config/+", "wifi/config/+", "wifistate/set"] {
            mqtt.subscribe(&format!("{base_topic}/{suffix}"), cfg.default_qos())
                .await
                .context("subscribing to inbound topic")?;
        }

        let publisher = mqtt.publisher_handle();
        let mut core = Core::new(
            BridgeKind::Supplicant,
            transport,
            mqtt,
            publisher,
            iface.clone(),
            cfg.quirks.clone(),
            cfg.default_qos(),
        );
        core.enqueue("ATTACH", linebridge::queue::SUPPLICANT_TIMEOUT)?;
        core.enqueue("STATUS", linebridge::queue::SUPPLICANT_TIMEOUT)?;
        core.run().await.context("running event loop")?;
        Ok::<(), anyhow::Error>(())
    })
}

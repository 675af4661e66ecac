//! AT-modem MQTT bridge binary: wires configuration, the tty transport,
//! and the MQTT client into a running [`linebridge::core::Core`].

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use linebridge::config::{BridgeConfig, Cli, Commands};
use linebridge::core::{BridgeKind, Core};
use linebridge::mqtt::Mqtt;
use linebridge::transport::tty::TtyTransport;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let base = BridgeConfig::load_or_default().context("loading configuration")?;
    let cfg = cli.command.apply_over(base);

    let Commands::Run { device, .. } = &cli.command else {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building current-thread runtime")?;

    rt.block_on(async move {
        info!("opening tty {device}");
        let transport = TtyTransport::open(device).context("opening tty transport")?;

        let client_id = format!("at-mqtt-bridge-{}", std::process::id());
        let mqtt = Mqtt::connect(&cfg.broker_host, cfg.broker_port, &client_id);
        mqtt.subscribe(
            &format!("{}/raw/send", cfg.topic_prefix),
            cfg.default_qos(),
        )
        .await
        .context("subscribing to inbound raw/send topic")?;
        mqtt.subscribe(&format!("{}/at/set", cfg.topic_prefix), cfg.default_qos())
            .await
            .context("subscribing to inbound at/set topic")?;
        mqtt.subscribe(
            &format!("{}/ops/scan", cfg.topic_prefix),
            cfg.default_qos(),
        )
        .await
        .context("subscribing to inbound ops/scan topic")?;

        let publisher = mqtt.publisher_handle();
        let mut core = Core::new(
            BridgeKind::At,
            transport,
            mqtt,
            publisher,
            cfg.topic_prefix.clone(),
            cfg.quirks.clone(),
            cfg.default_qos(),
        );
        core.enqueue("AT+CPIN?", linebridge::queue::DEFAULT_TIMEOUT)?;
        core.run().await.context("running event loop")?;
        Ok::<(), anyhow::Error>(())
    })
}

use std::time::Duration;

use tree_relay::core::{RelayConfig, MAX_TREE_LEVEL};
use tree_relay::radio::sim::{SimRadioHandle, SimulatedRadio};
use tree_relay::session::{AbpJoiner, Credentials, FileSessionStore, MemorySessionStore, SessionStore};
use tree_relay::{util, ModeCoordinator, Result};

/// Runs a relay node against the simulated radio.
///
/// Usage: `relay_sim [config.toml]`. Without a file a dual-role node at
/// level 2 is simulated. A neighbour one level down hands up a frame every
/// two seconds, and a deeper one every three.
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => RelayConfig::load(path).await?,
        None => RelayConfig {
            role: 3,
            tree_level: 2,
            uplink_period: Duration::from_secs(7),
            join: Some(Credentials::Abp {
                dev_addr: 0x2601_160C,
                nwk_skey: [0x58; 16],
                app_skey: [0x4B; 16],
            }),
            ..Default::default()
        },
    };
    util::init_tracing(&config.log_filter);

    match config.session_path.clone() {
        Some(path) => simulate(&config, FileSessionStore::new(path)).await,
        None => simulate(&config, MemorySessionStore::new()).await,
    }
}

async fn simulate<S: SessionStore + 'static>(config: &RelayConfig, store: S) -> Result<()> {
    let sim = SimulatedRadio::new();
    let radio = sim.handle();

    let mut coordinator = ModeCoordinator::from_config(config, sim, store)?;
    let mut joiner = AbpJoiner::new(config.channel_plan(), config.node_data_rate());
    coordinator.start(&mut joiner, config.join.as_ref())?;

    let handle = coordinator.handle().ok_or_else(|| {
        tree_relay::Error::invalid_state("coordinator did not start")
    })?;
    let level = coordinator.identity().level.level();
    let node = tokio::spawn(async move {
        let result = coordinator.run().await;
        (coordinator, result)
    });

    let neighbours = tokio::spawn(neighbours(radio.clone(), level));
    tokio::time::sleep(Duration::from_secs(30)).await;
    neighbours.abort();
    handle.stop().await;

    let (coordinator, result) = node
        .await
        .map_err(|e| tree_relay::Error::invalid_state(e.to_string()))?;
    result?;

    let info = coordinator.info();
    println!("\nFinal state: {}", info.state_type);
    println!("Frames received:  {}", info.stats.frames_received);
    println!("Frames forwarded: {}", info.stats.frames_forwarded);
    println!("Frames dropped:   {}", info.stats.frames_dropped);
    println!("Stale frames:     {}", info.stats.frames_stale);
    println!("Uplinks sent:     {}", info.stats.uplinks_sent);
    println!("Packets on air:   {}", radio.sent().len());
    Ok(())
}

/// Injects traffic from the levels below `level`
async fn neighbours(radio: SimRadioHandle, level: u8) {
    let below = level + 1;
    let mut fresh = tokio::time::interval(Duration::from_secs(2));
    let mut relayed = tokio::time::interval(Duration::from_secs(3));
    let mut seq = 0u8;

    loop {
        tokio::select! {
            _ = fresh.tick() => {
                seq = seq.wrapping_add(1);
                radio.inject(vec![64, seq, 0xA5]);
            }
            _ = relayed.tick() => {
                // Already marked by a relay at `below + 1`, heard here too
                let deeper = below + 1;
                if deeper <= MAX_TREE_LEVEL {
                    let marker = (deeper - 1) * 16 + deeper;
                    radio.inject(vec![marker, 64, seq]);
                }
            }
        }
    }
}

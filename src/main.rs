use wrtkit::configuration::Settings;
use wrtkit::{storage, trace, Router, RouterConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("wrtkit", log::LevelFilter::Debug)
        .init();

    let settings = Settings::new()?;
    let mut router = Router::new(RouterConfig {
        addr: settings.router.addr.clone(),
        username: settings.router.username.clone(),
        password: settings.router.password.clone(),
        timeout: settings.router.timeout(),
    });

    if let Some(subs) = &settings.subscriptions {
        router.update_subscriptions(&subs.urls).await?;
        println!("subscriptions refreshed ({} urls)", subs.urls.len());
    }

    let mut nodes = router.list_nodes().await?;
    if nodes.is_empty() {
        println!("no proxy nodes configured on {}", settings.router.addr);
        return Ok(());
    }

    let history = match &settings.storage {
        Some(conf) => Some(storage::open(&conf.path)?),
        None => None,
    };

    for node in nodes.iter_mut() {
        match router.probe_latency(node).await {
            Ok(()) => {
                println!("{node}");
                if let Some(conn) = &history {
                    storage::record_probe(conn, node)?;
                }
            }
            Err(err) => log::warn!("latency check failed for {}: {}", node, err),
        }
    }

    // Unprobed nodes keep a zero latency, the filter leaves them out.
    let best = nodes
        .iter()
        .filter(|n| !n.offline && n.latency_ms > 0)
        .min_by_key(|n| n.latency_ms);
    match best {
        Some(node) => {
            router.apply_global(Some(node)).await?;
            println!("global proxy switched to {node}");
        }
        None => log::warn!("no reachable node, leaving the global selection untouched"),
    }

    if let Some(conf) = &settings.trace {
        match trace::trace(&conf.url).await {
            Ok(timing) => println!("{} -> {}", conf.url, timing),
            Err(err) => log::warn!("timing {} failed: {}", conf.url, err),
        }
    }

    Ok(())
}

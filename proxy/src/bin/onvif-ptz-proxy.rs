use anyhow::{Context, Result};
use clap::Parser;
use config_manager::{CameraConfig, ProxyConfig};
use onvif_proxy::{
    run_proxy_server, Device, DeviceSettings, Endpoint, Multipliers, ProxiedCamera, ProxyState,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// ONVIF PTZ Proxy
///
/// - Serves one ONVIF endpoint per configured camera
/// - Scales RelativeMove pan/tilt deltas and tracks motion status
/// - Forwards everything else to the camera unchanged
#[derive(Parser)]
#[command(name = "onvif-ptz-proxy")]
#[command(about = "Translating ONVIF PTZ proxy for cameras with incomplete PTZ support")]
struct Cli {
    /// Camera configuration file (defaults to ~/.config/onvif-ptz-proxy/cameras.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level, including full modified SOAP payloads
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

/// `RUST_LOG` wins; otherwise info, or debug with `--debug`
fn log_filter(debug: bool) -> EnvFilter {
    let default = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_logging(debug: bool) {
    tracing_subscriber::fmt().with_env_filter(log_filter(debug)).init();
}

fn device_settings(config: &ProxyConfig, camera: &CameraConfig) -> Result<DeviceSettings> {
    let multipliers = Multipliers::new(camera.x_multiplier, camera.y_multiplier)
        .with_context(|| format!("Invalid multipliers for camera '{}'", camera.name))?;
    Ok(DeviceSettings {
        name: camera.name.clone(),
        camera: Endpoint::new(camera.camera_host.clone(), camera.camera_port),
        proxy: Endpoint::new(config.proxy_host.clone(), camera.proxy_port),
        multipliers,
        move_timeout: Duration::from_secs(camera.move_timeout),
    })
}

fn build_cameras(config: &ProxyConfig) -> Result<Vec<Arc<ProxiedCamera>>> {
    let forward_timeout = Duration::from_secs(config.forward_timeout_secs);
    config
        .cameras
        .iter()
        .map(|camera| {
            let device = Device::new(device_settings(config, camera)?);
            let proxied = ProxiedCamera::new(device, forward_timeout)
                .with_context(|| format!("Failed to set up camera '{}'", camera.name))?;
            Ok(Arc::new(proxied))
        })
        .collect()
}

async fn async_main(cli: Cli) -> Result<()> {
    let (config, config_path) = match cli.config {
        Some(path) => {
            let config = ProxyConfig::load_from(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            (config, path)
        }
        None => {
            let config = ProxyConfig::load().context("Failed to load camera configuration")?;
            (config, ProxyConfig::default_path()?)
        }
    };

    tracing::info!(
        "Loaded {} camera(s) from {}",
        config.cameras.len(),
        config_path.display()
    );

    let cameras = build_cameras(&config)?;
    let state = Arc::new(ProxyState::new(cameras.clone()));

    let mut servers = JoinSet::new();
    for camera in cameras {
        let device = camera.device();
        tracing::info!(
            "[{}] Camera {} -> proxy {} (x={}, y={}, move timeout {}s)",
            device.name(),
            device.camera().base_url(),
            device.proxy().base_url(),
            device.multipliers().pan,
            device.multipliers().tilt,
            device.move_timeout().as_secs()
        );

        let name = device.name().to_string();
        let bind_host = config.bind_host.clone();
        let state = Arc::clone(&state);
        servers.spawn(async move {
            if let Err(e) = run_proxy_server(&bind_host, state, camera).await {
                tracing::error!("[{}] Proxy server error: {}", name, e);
            }
        });
    }

    tracing::info!("Proxy running. Press Ctrl+C to stop.");
    supervise(servers, tokio::signal::ctrl_c()).await
}

/// Run until `shutdown` resolves. Fails if every server stops first.
async fn supervise(
    mut servers: JoinSet<()>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    tokio::select! {
        result = shutdown => {
            result.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = async { while servers.join_next().await.is_some() {} } => {
            anyhow::bail!("All proxy servers stopped");
        }
    }

    servers.shutdown().await;
    Ok(())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use slog::debug;
use slog::info;
use slog::warn;
use structopt::StructOpt;

use convert::Conversion;
use convert::ConvertSettings;
pub use errors::SdxdError;
use kytos::KytosClient;
use mirror::Mirror;
use publish::Publisher;
use scheduler::Debouncer;
use store::Store;
pub use types::SdxdResult;

mod api_server;
mod convert;
mod engine;
mod errors;
mod kytos;
mod l2vpn;
mod mirror;
mod publish;
mod scheduler;
mod store;
mod types;
mod urn;
mod vlan;

#[cfg(test)]
mod test_fixtures;

/// The mirror and everything derived from it, guarded by one lock.
pub struct TopologyState {
    pub mirror: Mirror,
    pub version: u64,
    pub timestamp: String,
    pub latest: Option<Conversion>,
}

/// All global state for the sdxd daemon
pub struct Global {
    /// Root of the tree of loggers
    pub log: slog::Logger,
    /// Conversion parameters: OXP identity, model version, filters
    pub settings: ConvertSettings,
    /// Mirror, version counter, and the latest converted document
    pub topology: Mutex<TopologyState>,
    /// Persisted copy of the converted document
    pub store: Store,
    /// Downstream SDX-LC publisher
    pub publisher: Publisher,
    /// Client for the kytos controller
    pub kytos: KytosClient,
    /// Prefix applied to EVC names provisioned through the L2VPN API
    pub name_prefix: String,
    /// Coalescing scheduler for topology events
    pub debouncer: Debouncer,
    /// List of addresses on which the api_server should listen.
    pub listen_addresses: Mutex<Vec<SocketAddr>>,
}

impl Global {
    fn new(log: &slog::Logger, opts: &Opt) -> Self {
        let settings = ConvertSettings {
            oxp_name: opts.oxp_name.clone(),
            oxp_url: opts.oxp_url.clone(),
            model_version: opts.model_version.clone(),
            export_switches: !opts.no_export_switches,
            export_interfaces: !opts.no_export_interfaces,
            export_links: !opts.no_export_links,
            override_vlan_range: opts
                .override_vlan_range
                .clone()
                .map(|ranges| ranges.0),
        };
        Global {
            log: log.clone(),
            settings,
            topology: Mutex::new(TopologyState {
                mirror: Mirror::new(),
                version: 0,
                timestamp: common::timestamp_now(),
                latest: None,
            }),
            store: Store::new(log, &opts.store_path),
            publisher: Publisher::new(log, opts.sdxlc_url.clone()),
            kytos: KytosClient::new(
                log,
                opts.kytos_topology_url.clone(),
                opts.kytos_tags_url.clone(),
                opts.kytos_evc_url.clone(),
            ),
            name_prefix: opts.name_prefix.clone(),
            debouncer: Debouncer::new(
                opts.max_event_wait,
                Duration::from_secs(1),
            ),
            listen_addresses: Mutex::new(Vec::new()),
        }
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "sdxd", about = "SDX topology exchange daemon")]
enum Args {
    /// Run the sdxd API server.
    Run(Opt),
}

/// A JSON-encoded list of [low, high] VLAN pairs, e.g. `[[100, 200]]`.
/// Wrapped so the whole list parses as one argument value.
#[derive(Clone, Debug)]
pub(crate) struct VlanRanges(Vec<[u16; 2]>);

impl std::str::FromStr for VlanRanges {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(text).map(VlanRanges).map_err(|e| {
            format!("expected a JSON list of [low, high] pairs: {e}")
        })
    }
}

#[derive(Clone, Debug, StructOpt)]
pub(crate) struct Opt {
    #[structopt(long, about = "log file")]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        default_value = "json",
        about = "log format",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: common::LogFormat,

    #[structopt(
        long,
        env = "SDXLC_URL",
        about = "URL of the SDX-LC topology endpoint (unset disables publishing)"
    )]
    sdxlc_url: Option<String>,

    #[structopt(
        long,
        env = "OXPO_NAME",
        default_value = "TestOXP",
        about = "Open Exchange Point name"
    )]
    oxp_name: String,

    #[structopt(
        long,
        env = "OXPO_URL",
        default_value = "testoxp.net",
        about = "Open Exchange Point URL, used in URN construction"
    )]
    oxp_url: String,

    #[structopt(
        long,
        env = "MODEL_VERSION",
        default_value = "2.0.0",
        about = "SDX topology model version"
    )]
    model_version: String,

    #[structopt(
        long,
        env = "KYTOS_TOPOLOGY_URL",
        default_value = "http://127.0.0.1:8181/api/kytos/topology/v3/",
        about = "kytos topology API"
    )]
    kytos_topology_url: String,

    #[structopt(
        long,
        env = "KYTOS_TAGS_URL",
        default_value = "http://127.0.0.1:8181/api/kytos/topology/v3/interfaces/tag_ranges",
        about = "kytos endpoint for per-interface vlan tag ranges"
    )]
    kytos_tags_url: String,

    #[structopt(
        long,
        env = "KYTOS_EVC_URL",
        default_value = "http://127.0.0.1:8181/api/kytos/mef_eline/v2/evc/",
        about = "kytos mef_eline endpoint for L2VPN provisioning"
    )]
    kytos_evc_url: String,

    #[structopt(
        long,
        env = "TOPOLOGY_EVENT_WAIT",
        default_value = "5",
        about = "maximum debounce window for topology events, in seconds"
    )]
    max_event_wait: u64,

    #[structopt(
        long,
        env = "SDXD_STORE_PATH",
        default_value = "sdx_topology.json",
        about = "path of the persisted topology document"
    )]
    store_path: String,

    #[structopt(
        long,
        env = "OVERRIDE_VLAN_RANGE",
        about = "vlan range to export when an interface has no sdx_vlan_range \
                 metadata, e.g. [[100, 200]]"
    )]
    override_vlan_range: Option<VlanRanges>,

    #[structopt(
        long,
        env = "NAME_PREFIX",
        default_value = "SDX-L2VPN-",
        about = "prefix applied to EVC names provisioned over the L2VPN API"
    )]
    name_prefix: String,

    #[structopt(long, about = "do not export switches")]
    no_export_switches: bool,
    #[structopt(long, about = "do not export interfaces")]
    no_export_interfaces: bool,
    #[structopt(long, about = "do not export links")]
    no_export_links: bool,

    #[structopt(
        long = "listen-addr",
        short = "a",
        about = "SocketAddr sdxd should listen on. (default localhost:12240)"
    )]
    listen_addr: Option<SocketAddr>,
}

async fn signal_handler(
    g: Arc<Global>,
    _api_tx: tokio::sync::watch::Sender<()>,
) {
    const SIGNALS: &[std::ffi::c_int] = &[SIGTERM, SIGQUIT, SIGINT, SIGHUP];
    let mut sigs = Signals::new(SIGNALS).unwrap();

    let log = g.log.new(slog::o!("unit" => "signal-handler"));
    for signal in &mut sigs {
        if signal == SIGINT || signal == SIGQUIT || signal == SIGTERM {
            info!(&log, "caught signal {signal} - exiting");
            break;
        }
    }
}

/// Seed the version counter from the persisted document so a restart
/// never republishes with a stale version number.
fn seed_from_store(global: &Global) {
    match global.store.get() {
        Ok(Some(stored)) => {
            let mut state = global.topology.lock().unwrap();
            state.version = stored.document.version;
            state.timestamp = stored.document.timestamp.clone();
            info!(global.log, "loaded persisted topology document";
                "version" => stored.document.version);
        }
        Ok(None) => {
            debug!(global.log, "no persisted topology document found");
        }
        Err(e) => {
            warn!(global.log, "failed to load persisted document: {e}");
        }
    }
}

async fn run_sdxd(opts: Opt) -> SdxdResult<()> {
    let log = common::log_init("sdxd", &opts.log_file, opts.log_format)?;

    let global = Arc::new(Global::new(&log, &opts));
    if !global.publisher.enabled() {
        info!(&log, "SDXLC_URL is unset; downstream publishing is disabled");
    }
    seed_from_store(&global);

    // Prime the mirror from the controller.  An unreachable controller
    // is not fatal; the first topology event will catch us up.
    match global.kytos.fetch_topology().await {
        Ok(snapshot) => {
            engine::update_cycle(&global, snapshot, Utc::now()).await
        }
        Err(e) => warn!(&log, "initial topology fetch failed: {e}"),
    }

    let listen_addr = opts.listen_addr.unwrap_or(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        common::DEFAULT_SDXD_PORT,
    ));
    global.listen_addresses.lock().unwrap().push(listen_addr);

    let (api_tx, api_rx) = tokio::sync::watch::channel(());
    let api_global = global.clone();
    let api_server_manager = tokio::task::spawn(async move {
        api_server::api_server_manager(api_global, api_rx).await
    });

    signal_handler(global.clone(), api_tx).await;

    debug!(&log, "shutting down API server");
    api_server_manager
        .await
        .expect("while shutting down the api_server_manager");

    info!(&log, "exiting");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> SdxdResult<()> {
    let args = Args::from_args();

    match args {
        Args::Run(opt) => run_sdxd(opt).await,
    }
}

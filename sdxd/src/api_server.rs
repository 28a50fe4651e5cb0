// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SDX topology HTTP API types and endpoint functions.

use std::collections::HashMap;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use dropshot::endpoint;
use dropshot::HttpError;
use dropshot::HttpResponseCreated;
use dropshot::HttpResponseOk;
use dropshot::HttpResponseUpdatedNoContent;
use dropshot::Path;
use dropshot::RequestContext;
use dropshot::TypedBody;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;

use crate::engine;
use crate::errors::SdxdError;
use crate::l2vpn;
use crate::scheduler::Submit;
use crate::types::Metadata;
use crate::types::ObjectType;
use crate::types::TopologySnapshot;
use crate::Global;

type ApiServer = dropshot::HttpServer<Arc<Global>>;

/// Version and timestamp of the current converted document.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct VersionInfo {
    pub version: u64,
    pub timestamp: String,
    pub model_version: String,
}

/// A topology-changed notification.  The snapshot is optional; when it is
/// absent the daemon fetches the current topology from the controller.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct TopologyEvent {
    pub topology: Option<TopologySnapshot>,
    pub event_timestamp: String,
}

/// A metadata-changed notification for a single switch, interface, or
/// link.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct MetadataEvent {
    pub object_type: ObjectType,
    pub object_id: String,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct EventDisposition {
    pub accepted: bool,
}

#[derive(Deserialize, JsonSchema)]
struct ServiceIdPath {
    service_id: String,
}

/// Report the version and timestamp of the current topology document
#[endpoint {
    method = GET,
    path = "/version",
}]
async fn version_get(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<VersionInfo>, HttpError> {
    let global: &Global = rqctx.context();
    let state = global.topology.lock().unwrap();
    Ok(HttpResponseOk(VersionInfo {
        version: state.version,
        timestamp: state.timestamp.clone(),
        model_version: global.settings.model_version.clone(),
    }))
}

/// Fetch the latest converted topology document
#[endpoint {
    method = GET,
    path = "/topology/2.0.0",
}]
async fn topology_get(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<Value>, HttpError> {
    let global: &Global = rqctx.context();
    let state = global.topology.lock().unwrap();
    let body = match &state.latest {
        Some(conversion) => serde_json::to_value(&conversion.document)
            .map_err(|e| SdxdError::from(e))?,
        None => json!({}),
    };
    Ok(HttpResponseOk(body))
}

/// Force a publish of the latest converted document to the SDX-LC
#[endpoint {
    method = POST,
    path = "/topology/2.0.0",
}]
async fn topology_publish(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseUpdatedNoContent, HttpError> {
    let global: &Global = rqctx.context();
    engine::force_publish(global).await?;
    Ok(HttpResponseUpdatedNoContent())
}

/// Accept a topology-changed notification
#[endpoint {
    method = POST,
    path = "/events/topology",
}]
async fn topology_event(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<TopologyEvent>,
) -> Result<HttpResponseOk<EventDisposition>, HttpError> {
    let global = rqctx.context();
    let event = body.into_inner();
    let timestamp = DateTime::parse_from_rfc3339(&event.event_timestamp)
        .map_err(|e| {
            SdxdError::Invalid(format!(
                "event_timestamp: {e}: {}",
                event.event_timestamp
            ))
        })?
        .with_timezone(&Utc);

    let snapshot = match event.topology {
        Some(snapshot) => snapshot,
        None => global.kytos.fetch_topology().await?,
    };

    let disposition = match global.debouncer.submit(snapshot, timestamp) {
        Submit::Stale => {
            debug!(global.log, "dropped stale topology event";
                "event_timestamp" => event.event_timestamp);
            EventDisposition { accepted: false }
        }
        Submit::Coalesced => EventDisposition { accepted: true },
        Submit::Lead => {
            let g = global.clone();
            tokio::spawn(async move {
                let cycle_g = g.clone();
                g.debouncer
                    .drive(move |snapshot, timestamp| {
                        let g = cycle_g.clone();
                        async move {
                            engine::update_cycle(&g, snapshot, timestamp)
                                .await
                        }
                    })
                    .await;
            });
            EventDisposition { accepted: true }
        }
    };
    Ok(HttpResponseOk(disposition))
}

/// Accept a metadata-changed notification for a single object
#[endpoint {
    method = POST,
    path = "/events/metadata",
}]
async fn metadata_event(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<MetadataEvent>,
) -> Result<HttpResponseOk<EventDisposition>, HttpError> {
    let global: &Global = rqctx.context();
    let event = body.into_inner();
    let accepted = engine::metadata_cycle(
        global,
        event.object_type,
        &event.object_id,
        &event.metadata,
    )
    .await?;
    Ok(HttpResponseOk(EventDisposition { accepted }))
}

// The L2VPN endpoints translate between SDX port URNs and kytos EVC
// descriptions, then forward to mef_eline.  They need the id maps from
// the latest conversion.
fn id_maps(
    global: &Global,
) -> Result<
    (
        std::collections::BTreeMap<String, String>,
        std::collections::BTreeMap<String, String>,
    ),
    SdxdError,
> {
    let state = global.topology.lock().unwrap();
    match &state.latest {
        Some(c) => Ok((c.kytos2sdx.clone(), c.sdx2kytos.clone())),
        None => Err(SdxdError::Conversion(
            "no topology document has been converted yet".into(),
        )),
    }
}

/// Provision a point-to-point L2VPN
#[endpoint {
    method = POST,
    path = "/l2vpn/1.0",
}]
async fn l2vpn_create(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<l2vpn::L2vpnRequest>,
) -> Result<HttpResponseCreated<Value>, HttpError> {
    let global: &Global = rqctx.context();
    let request = body.into_inner();
    let (kytos2sdx, sdx2kytos) = id_maps(global)?;
    let evc = l2vpn::build_evc(&request, &sdx2kytos, &global.name_prefix)?;
    info!(global.log, "creating l2vpn"; "name" => &request.name);
    let created = global.kytos.create_evc(&evc).await?;
    Ok(HttpResponseCreated(l2vpn::translate_evc(
        &created,
        &kytos2sdx,
        &global.name_prefix,
    )))
}

/// List provisioned L2VPNs
#[endpoint {
    method = GET,
    path = "/l2vpn/1.0",
}]
async fn l2vpn_list(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<Value>, HttpError> {
    let global: &Global = rqctx.context();
    let (kytos2sdx, _) = id_maps(global)?;
    let evcs = global.kytos.list_evcs().await?;
    let translated = match evcs.as_object() {
        Some(map) => map
            .iter()
            .map(|(id, evc)| {
                (
                    id.clone(),
                    l2vpn::translate_evc(evc, &kytos2sdx, &global.name_prefix),
                )
            })
            .collect(),
        None => json!({}),
    };
    Ok(HttpResponseOk(translated))
}

/// Fetch one provisioned L2VPN
#[endpoint {
    method = GET,
    path = "/l2vpn/1.0/{service_id}",
}]
async fn l2vpn_get(
    rqctx: RequestContext<Arc<Global>>,
    path: Path<ServiceIdPath>,
) -> Result<HttpResponseOk<Value>, HttpError> {
    let global: &Global = rqctx.context();
    let service_id = path.into_inner().service_id;
    let (kytos2sdx, _) = id_maps(global)?;
    let evc = global.kytos.get_evc(&service_id).await?;
    Ok(HttpResponseOk(l2vpn::translate_evc(
        &evc,
        &kytos2sdx,
        &global.name_prefix,
    )))
}

/// Modify a provisioned L2VPN
#[endpoint {
    method = PATCH,
    path = "/l2vpn/1.0/{service_id}",
}]
async fn l2vpn_update(
    rqctx: RequestContext<Arc<Global>>,
    path: Path<ServiceIdPath>,
    body: TypedBody<l2vpn::L2vpnRequest>,
) -> Result<HttpResponseOk<Value>, HttpError> {
    let global: &Global = rqctx.context();
    let service_id = path.into_inner().service_id;
    let request = body.into_inner();
    let (kytos2sdx, sdx2kytos) = id_maps(global)?;
    let evc = l2vpn::build_evc(&request, &sdx2kytos, &global.name_prefix)?;
    info!(global.log, "updating l2vpn"; "service_id" => &service_id);
    let updated = global.kytos.update_evc(&service_id, &evc).await?;
    Ok(HttpResponseOk(l2vpn::translate_evc(
        &updated,
        &kytos2sdx,
        &global.name_prefix,
    )))
}

/// Remove a provisioned L2VPN
#[endpoint {
    method = DELETE,
    path = "/l2vpn/1.0/{service_id}",
}]
async fn l2vpn_delete(
    rqctx: RequestContext<Arc<Global>>,
    path: Path<ServiceIdPath>,
) -> Result<HttpResponseOk<Value>, HttpError> {
    let global: &Global = rqctx.context();
    let service_id = path.into_inner().service_id;
    info!(global.log, "deleting l2vpn"; "service_id" => &service_id);
    let deleted = global.kytos.delete_evc(&service_id).await?;
    Ok(HttpResponseOk(deleted))
}

fn launch_server(
    global: Arc<Global>,
    addr: &SocketAddr,
    id: u32,
) -> anyhow::Result<ApiServer> {
    let config_dropshot = dropshot::ConfigDropshot {
        bind_address: *addr,
        request_body_max_bytes: 1048576,
        default_handler_task_mode: dropshot::HandlerTaskMode::Detached,
    };
    let log = global
        .log
        .new(o!("unit" => "api-server", "server_id" => id.to_string()));

    slog::info!(log, "starting api server {id} on {addr}");
    dropshot::HttpServerStarter::new(
        &config_dropshot,
        http_api(),
        global.clone(),
        &log,
    )
    .map(|s| s.start())
    .map_err(|e| anyhow::anyhow!(e.to_string()))
}

// Manage the set of api servers currently listening for requests.  The
// population follows the listen_addresses vector in the Global structure;
// a message on config_rx tells us to re-evaluate it, and a dropped tx side
// tells us to shut down.
pub async fn api_server_manager(
    global: Arc<Global>,
    mut config_rx: tokio::sync::watch::Receiver<()>,
) {
    let mut active = HashMap::<SocketAddr, ApiServer>::new();
    let mut id = 0;
    let mut running = true;

    let log = global.log.new(o!("unit" => "api-server-manager"));
    while running {
        let active_addrs = active.keys().cloned().collect::<Vec<SocketAddr>>();
        let mut config_addrs =
            global.listen_addresses.lock().unwrap().to_vec();
        // We always listen on localhost
        config_addrs.push(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            common::DEFAULT_SDXD_PORT,
        ));
        let (add, remove) = common::purge_common(&config_addrs, &active_addrs);

        for addr in remove {
            let hdl = active.remove(&addr).unwrap();
            info!(log, "closing api server on {addr}");
            if let Err(e) = hdl.close().await {
                error!(log, "error closing api server on {addr}: {e:?}");
            }
        }

        for addr in &add {
            // Increase the `id` to give each server a unique name
            id += 1;
            match launch_server(global.clone(), addr, id) {
                Ok(s) => {
                    active.insert(*addr, s);
                }
                Err(e) => {
                    error!(
                        log,
                        "failed to launch api server {id} on {addr}: {e:?}"
                    );
                }
            };
        }

        running = config_rx.changed().await.is_ok();
    }

    for (addr, hdl) in active {
        info!(log, "closing api server on {addr}");
        if let Err(e) = hdl.close().await {
            error!(log, "error closing api server on {addr}: {e:?}");
        }
    }
}

pub fn http_api() -> dropshot::ApiDescription<Arc<Global>> {
    let mut api = dropshot::ApiDescription::new();

    api.register(version_get).unwrap();
    api.register(topology_get).unwrap();
    api.register(topology_publish).unwrap();
    api.register(topology_event).unwrap();
    api.register(metadata_event).unwrap();
    api.register(l2vpn_create).unwrap();
    api.register(l2vpn_list).unwrap();
    api.register(l2vpn_get).unwrap();
    api.register(l2vpn_update).unwrap();
    api.register(l2vpn_delete).unwrap();
    api
}

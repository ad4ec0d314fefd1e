// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use super::{MarshalError, fixed};
use crate::abi::{
    EndpointSpec, UpsfEndpoint, UpsfL2vpn, UpsfMaintenance, UpsfMetaData, UpsfPortVlan,
    UpsfSessionFilter, UpsfVtep,
};
use upsf_client::proto::{
    Endpoint, L2vpn, Maintenance, MetaData, PortVlan, SessionFilter, Vtep, endpoint,
};

pub(crate) fn metadata_to_abi(metadata: Option<&MetaData>) -> UpsfMetaData {
    let Some(metadata) = metadata else {
        return UpsfMetaData::default();
    };
    UpsfMetaData {
        description: fixed("metadata.description", &metadata.description),
        derived_state: metadata.derived_state,
    }
}

pub(crate) fn metadata_from_abi(metadata: &UpsfMetaData) -> MetaData {
    MetaData {
        description: metadata.description.to_string_lossy(),
        derived_state: metadata.derived_state,
    }
}

pub(crate) fn maintenance_to_abi(maintenance: Option<&Maintenance>) -> UpsfMaintenance {
    UpsfMaintenance {
        maintenance_req: maintenance.map(|m| m.maintenance_req).unwrap_or_default(),
    }
}

pub(crate) fn maintenance_from_abi(maintenance: &UpsfMaintenance) -> Maintenance {
    Maintenance {
        maintenance_req: maintenance.maintenance_req,
    }
}

pub(crate) fn session_filter_to_abi(filter: Option<&SessionFilter>) -> UpsfSessionFilter {
    let Some(filter) = filter else {
        return UpsfSessionFilter::default();
    };
    UpsfSessionFilter {
        source_mac_address: fixed("session_filter.source_mac_address", &filter.source_mac_address),
        svlan: filter.svlan,
        cvlan: filter.cvlan,
    }
}

pub(crate) fn session_filter_from_abi(filter: &UpsfSessionFilter) -> SessionFilter {
    SessionFilter {
        source_mac_address: filter.source_mac_address.to_string_lossy(),
        svlan: filter.svlan,
        cvlan: filter.cvlan,
    }
}

/// Converts an endpoint message. A message without transport has no
/// record form.
pub fn endpoint_to_abi(
    field: &'static str,
    endpoint: &Endpoint,
) -> Result<UpsfEndpoint, MarshalError> {
    let spec = match &endpoint.transport_endpoint {
        Some(endpoint::TransportEndpoint::Vtep(vtep)) => EndpointSpec::Vtep(UpsfVtep {
            ip_address: fixed(field, &vtep.ip_address),
            udp_port: vtep.udp_port,
            vni: vtep.vni,
        }),
        Some(endpoint::TransportEndpoint::L2vpn(l2vpn)) => EndpointSpec::L2vpn(UpsfL2vpn {
            vpn_id: l2vpn.vpn_id,
        }),
        Some(endpoint::TransportEndpoint::PortVlan(port_vlan)) => {
            EndpointSpec::PortVlan(UpsfPortVlan {
                logical_port: fixed(field, &port_vlan.logical_port),
                svlan: port_vlan.svlan,
                cvlan: port_vlan.cvlan,
            })
        }
        None => return Err(MarshalError::Unmappable { field }),
    };

    let mut record = UpsfEndpoint {
        endpoint_name: fixed(field, &endpoint.endpoint_name),
        ..Default::default()
    };
    record.set_spec(Some(spec));
    Ok(record)
}

/// Converts a single endpoint slot; an absent endpoint is `UPSF_EP_TYPE_NONE`.
pub(crate) fn optional_endpoint_to_abi(
    field: &'static str,
    endpoint: Option<&Endpoint>,
) -> Result<UpsfEndpoint, MarshalError> {
    match endpoint {
        Some(endpoint) => endpoint_to_abi(field, endpoint),
        None => Ok(UpsfEndpoint::default()),
    }
}

/// Converts an endpoint record, `None` for `UPSF_EP_TYPE_NONE`.
pub fn endpoint_from_abi(
    field: &'static str,
    endpoint: &UpsfEndpoint,
) -> Result<Option<Endpoint>, MarshalError> {
    let spec = endpoint
        .spec()
        .map_err(|_| MarshalError::Unmappable { field })?;

    let transport = match spec {
        None => return Ok(None),
        Some(EndpointSpec::Vtep(vtep)) => endpoint::TransportEndpoint::Vtep(Vtep {
            ip_address: vtep.ip_address.to_string_lossy(),
            udp_port: vtep.udp_port,
            vni: vtep.vni,
        }),
        Some(EndpointSpec::L2vpn(l2vpn)) => endpoint::TransportEndpoint::L2vpn(L2vpn {
            vpn_id: l2vpn.vpn_id,
        }),
        Some(EndpointSpec::PortVlan(port_vlan)) => {
            endpoint::TransportEndpoint::PortVlan(PortVlan {
                logical_port: port_vlan.logical_port.to_string_lossy(),
                svlan: port_vlan.svlan,
                cvlan: port_vlan.cvlan,
            })
        }
    };

    Ok(Some(Endpoint {
        endpoint_name: endpoint.endpoint_name.to_string_lossy(),
        transport_endpoint: Some(transport),
    }))
}

/// Element of an endpoint list. Lists hold present endpoints only, so a
/// record without transport has no message form.
pub(crate) fn listed_endpoint_from_abi(
    field: &'static str,
    endpoint: &UpsfEndpoint,
) -> Result<Endpoint, MarshalError> {
    endpoint_from_abi(field, endpoint)?.ok_or(MarshalError::Unmappable { field })
}

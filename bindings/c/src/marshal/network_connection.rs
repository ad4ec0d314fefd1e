// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use super::common::{
    endpoint_from_abi, endpoint_to_abi, listed_endpoint_from_abi, maintenance_from_abi,
    maintenance_to_abi, metadata_from_abi, metadata_to_abi, optional_endpoint_to_abi,
};
use super::{AbiRecord, MarshalError, fill_bounded, fill_map, fixed, map};
use crate::abi::{
    EndpointList, FixedString, NcTopology, UpsfMsMptpSpec, UpsfMsPtpSpec, UpsfNetworkConnection,
    UpsfNetworkConnectionSpec, UpsfNetworkConnectionStatus, UpsfSsMptpSpec, UpsfSsPtpSpec,
};
use upsf_client::proto::network_connection::spec::{
    MsMptpSpec, MsPtpSpec, NcSpec, SsMptpSpec, SsPtpSpec,
};
use upsf_client::proto::{Endpoint, NetworkConnection, network_connection};

const TOPOLOGY: &str = "spec.nc_spec";

fn fill_endpoints(
    field: &'static str,
    source: &[Endpoint],
    dest: &mut EndpointList,
) -> Result<(), MarshalError> {
    fill_bounded(field, source, dest, |ep| endpoint_to_abi(field, ep))
}

fn endpoints(field: &'static str, list: &EndpointList) -> Result<Vec<Endpoint>, MarshalError> {
    list.as_slice()
        .iter()
        .map(|ep| listed_endpoint_from_abi(field, ep))
        .collect()
}

fn topology_to_abi(nc_spec: &NcSpec) -> Result<NcTopology, MarshalError> {
    let topology = match nc_spec {
        NcSpec::SsPtp(spec) => {
            let mut ss_ptp = UpsfSsPtpSpec {
                tsf_endpoint: optional_endpoint_to_abi(
                    "spec.ss_ptp.tsf_endpoint",
                    spec.tsf_endpoint.as_ref(),
                )?,
                ..Default::default()
            };
            fill_endpoints(
                "spec.ss_ptp.sgup_endpoint",
                &spec.sgup_endpoint,
                &mut ss_ptp.sgup_endpoint,
            )?;
            NcTopology::SsPtp(ss_ptp)
        }
        NcSpec::SsMptpc(spec) => {
            let mut ss_mptp = UpsfSsMptpSpec::default();
            fill_endpoints(
                "spec.ss_mptp.sgup_endpoint",
                &spec.sgup_endpoint,
                &mut ss_mptp.sgup_endpoint,
            )?;
            fill_endpoints(
                "spec.ss_mptp.tsf_endpoint",
                &spec.tsf_endpoint,
                &mut ss_mptp.tsf_endpoint,
            )?;
            NcTopology::SsMptp(ss_mptp)
        }
        NcSpec::MsPtp(spec) => NcTopology::MsPtp(UpsfMsPtpSpec {
            sgup_endpoint: optional_endpoint_to_abi(
                "spec.ms_ptp.sgup_endpoint",
                spec.sgup_endpoint.as_ref(),
            )?,
            tsf_endpoint: optional_endpoint_to_abi(
                "spec.ms_ptp.tsf_endpoint",
                spec.tsf_endpoint.as_ref(),
            )?,
        }),
        NcSpec::MsMptp(spec) => {
            let mut ms_mptp = UpsfMsMptpSpec {
                sgup_endpoint: optional_endpoint_to_abi(
                    "spec.ms_mptp.sgup_endpoint",
                    spec.sgup_endpoint.as_ref(),
                )?,
                ..Default::default()
            };
            fill_endpoints(
                "spec.ms_mptp.tsf_endpoint",
                &spec.tsf_endpoint,
                &mut ms_mptp.tsf_endpoint,
            )?;
            NcTopology::MsMptp(ms_mptp)
        }
    };
    Ok(topology)
}

fn topology_from_abi(topology: &NcTopology) -> Result<NcSpec, MarshalError> {
    let nc_spec = match topology {
        NcTopology::SsPtp(spec) => NcSpec::SsPtp(SsPtpSpec {
            sgup_endpoint: endpoints("spec.ss_ptp.sgup_endpoint", &spec.sgup_endpoint)?,
            tsf_endpoint: endpoint_from_abi("spec.ss_ptp.tsf_endpoint", &spec.tsf_endpoint)?,
        }),
        NcTopology::SsMptp(spec) => NcSpec::SsMptpc(SsMptpSpec {
            sgup_endpoint: endpoints("spec.ss_mptp.sgup_endpoint", &spec.sgup_endpoint)?,
            tsf_endpoint: endpoints("spec.ss_mptp.tsf_endpoint", &spec.tsf_endpoint)?,
        }),
        NcTopology::MsPtp(spec) => NcSpec::MsPtp(MsPtpSpec {
            sgup_endpoint: endpoint_from_abi("spec.ms_ptp.sgup_endpoint", &spec.sgup_endpoint)?,
            tsf_endpoint: endpoint_from_abi("spec.ms_ptp.tsf_endpoint", &spec.tsf_endpoint)?,
        }),
        NcTopology::MsMptp(spec) => NcSpec::MsMptp(MsMptpSpec {
            sgup_endpoint: endpoint_from_abi("spec.ms_mptp.sgup_endpoint", &spec.sgup_endpoint)?,
            tsf_endpoint: endpoints("spec.ms_mptp.tsf_endpoint", &spec.tsf_endpoint)?,
        }),
    };
    Ok(nc_spec)
}

impl AbiRecord for UpsfNetworkConnection {
    type Message = NetworkConnection;

    fn from_message(message: &NetworkConnection) -> Result<Self, MarshalError> {
        // a connection always has a topology
        let spec = message
            .spec
            .as_ref()
            .ok_or(MarshalError::Unmappable { field: TOPOLOGY })?;
        let nc_spec = spec
            .nc_spec
            .as_ref()
            .ok_or(MarshalError::Unmappable { field: TOPOLOGY })?;

        let mut record = UpsfNetworkConnection {
            name: fixed("name", &message.name),
            metadata: metadata_to_abi(message.metadata.as_ref()),
            maintenance: maintenance_to_abi(message.maintenance.as_ref()),
            spec: UpsfNetworkConnectionSpec {
                maximum_supported_quality: spec.maximum_supported_quality,
                ..Default::default()
            },
            ..Default::default()
        };
        record.spec.set_topology(topology_to_abi(nc_spec)?);

        if let Some(status) = &message.status {
            record.status = UpsfNetworkConnectionStatus {
                allocated_shards: status.allocated_shards,
                ..Default::default()
            };
            fill_map(
                "status.nc_active",
                &status.nc_active,
                &mut record.status.nc_active,
                |active| (if *active { "1" } else { "0" }).to_string(),
            )?;
        }

        Ok(record)
    }

    fn to_message(&self) -> Result<NetworkConnection, MarshalError> {
        let topology = self
            .spec
            .topology()
            .map_err(|_| MarshalError::Unmappable { field: TOPOLOGY })?;

        Ok(NetworkConnection {
            name: self.name.to_string_lossy(),
            metadata: Some(metadata_from_abi(&self.metadata)),
            maintenance: Some(maintenance_from_abi(&self.maintenance)),
            spec: Some(network_connection::Spec {
                maximum_supported_quality: self.spec.maximum_supported_quality,
                nc_spec: Some(topology_from_abi(&topology)?),
            }),
            status: Some(network_connection::Status {
                nc_active: map(&self.status.nc_active, |v| v == "1" || v == "true"),
                allocated_shards: self.status.allocated_shards,
            }),
        })
    }

    fn name(&self) -> &FixedString {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{
        UPSF_EP_TYPE_VTEP, UPSF_MAX_NUM_ENDPOINTS, UPSF_NC_SPEC_TYPE_MS_MPTP,
        UPSF_NC_SPEC_TYPE_NONE, UPSF_NC_SPEC_TYPE_SS_PTP,
    };
    use tracing_test::traced_test;
    use upsf_client::proto::{Vtep, endpoint};

    fn vtep(name: &str) -> Endpoint {
        Endpoint {
            endpoint_name: name.to_string(),
            transport_endpoint: Some(endpoint::TransportEndpoint::Vtep(Vtep {
                ip_address: "10.0.0.1".to_string(),
                udp_port: 4789,
                vni: 100,
            })),
        }
    }

    fn connection(nc_spec: Option<NcSpec>) -> NetworkConnection {
        NetworkConnection {
            name: "nc-1".to_string(),
            spec: Some(network_connection::Spec {
                maximum_supported_quality: 5,
                nc_spec,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_ss_ptp() {
        let message = connection(Some(NcSpec::SsPtp(SsPtpSpec {
            sgup_endpoint: vec![vtep("up-a"), vtep("up-b")],
            tsf_endpoint: Some(vtep("tsf")),
        })));

        let record = UpsfNetworkConnection::from_message(&message).unwrap();
        assert_eq!(record.spec.nc_spec_type, UPSF_NC_SPEC_TYPE_SS_PTP);
        let NcTopology::SsPtp(ss_ptp) = record.spec.topology().unwrap() else {
            panic!("wrong topology");
        };
        assert_eq!(ss_ptp.sgup_endpoint.count, 2);
        assert_eq!(ss_ptp.tsf_endpoint.ep_type, UPSF_EP_TYPE_VTEP);

        let back = record.to_message().unwrap();
        assert_eq!(back.spec, message.spec);
        assert_eq!(UpsfNetworkConnection::from_message(&back).unwrap(), record);
    }

    #[test]
    #[traced_test]
    fn test_ms_mptp_truncation() {
        let tsf_endpoint = (0..20).map(|i| vtep(&format!("tsf-{i}"))).collect();
        let message = connection(Some(NcSpec::MsMptp(MsMptpSpec {
            sgup_endpoint: Some(vtep("up")),
            tsf_endpoint,
        })));

        let record = UpsfNetworkConnection::from_message(&message).unwrap();
        assert_eq!(record.spec.nc_spec_type, UPSF_NC_SPEC_TYPE_MS_MPTP);
        let NcTopology::MsMptp(ms_mptp) = record.spec.topology().unwrap() else {
            panic!("wrong topology");
        };
        assert_eq!(ms_mptp.tsf_endpoint.count, UPSF_MAX_NUM_ENDPOINTS);
        assert_eq!(
            ms_mptp.tsf_endpoint.as_slice()[15].endpoint_name.to_string_lossy(),
            "tsf-15"
        );
        assert!(logs_contain("spec.ms_mptp.tsf_endpoint"));
    }

    #[test]
    fn test_missing_topology_is_unmappable() {
        let err = UpsfNetworkConnection::from_message(&connection(None)).unwrap_err();
        assert_eq!(err, MarshalError::Unmappable { field: TOPOLOGY });

        let record = UpsfNetworkConnection::default();
        assert_eq!(record.spec.nc_spec_type, UPSF_NC_SPEC_TYPE_NONE);
        assert!(record.to_message().is_err());
    }

    #[test]
    fn test_nc_active_flags() {
        let mut message = connection(Some(NcSpec::MsPtp(MsPtpSpec::default())));
        message.status = Some(network_connection::Status {
            nc_active: [("up-a".to_string(), true), ("up-b".to_string(), false)]
                .into_iter()
                .collect(),
            allocated_shards: 2,
        });

        let record = UpsfNetworkConnection::from_message(&message).unwrap();
        let flags: Vec<_> = record
            .status
            .nc_active
            .as_slice()
            .iter()
            .map(|kv| (kv.key.to_string_lossy(), kv.value.to_string_lossy()))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("up-a".to_string(), "1".to_string()),
                ("up-b".to_string(), "0".to_string())
            ]
        );
        assert_eq!(record.to_message().unwrap().status, message.status);
    }
}

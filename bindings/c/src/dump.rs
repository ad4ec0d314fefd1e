// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! One line diagnostic renderings of the records and the enum names they
//! print.

use std::ffi::{CStr, c_int};
use std::fmt::{self, Display, Formatter, Write};

use crate::abi::{
    BoundedList, EndpointSpec, NcTopology, UpsfEndpoint, UpsfKeyValue,
    UpsfMaintenance, UpsfMetaData, UpsfNetworkConnection, UpsfServiceGateway,
    UpsfServiceGatewayUserPlane, UpsfSessionContext, UpsfShard, UpsfTrafficSteeringFunction,
};

const INVALID: &CStr = c"invalid";

const DERIVED_STATE_NAMES: [&CStr; 6] = [
    c"unknown",
    c"inactive",
    c"active",
    c"updating",
    c"deleting",
    c"deleted",
];

const MAINTENANCE_REQ_NAMES: [&CStr; 3] = [c"none", c"drain", c"drain_and_delete"];

const MBB_STATE_NAMES: [&CStr; 7] = [
    c"non_mbb_move_required",
    c"userplane_mbb_move_required",
    c"upstream_switchover_required",
    c"downstream_switchover_required",
    c"upstream_finalize",
    c"mbb_complete",
    c"mbb_failure",
];

fn lookup(names: &[&'static CStr], value: c_int) -> &'static CStr {
    usize::try_from(value)
        .ok()
        .and_then(|i| names.get(i).copied())
        .unwrap_or(INVALID)
}

pub fn derived_state_name(value: c_int) -> &'static CStr {
    lookup(&DERIVED_STATE_NAMES, value)
}

pub fn maintenance_req_name(value: c_int) -> &'static CStr {
    lookup(&MAINTENANCE_REQ_NAMES, value)
}

pub fn mbb_state_name(value: c_int) -> &'static CStr {
    lookup(&MBB_STATE_NAMES, value)
}

fn name_str(name: &'static CStr) -> &'static str {
    name.to_str().unwrap_or("invalid")
}

/// Renders `value` into `buf` as a NUL terminated string, cutting it at a
/// character boundary when it does not fit. Returns the number of bytes
/// written before the NUL.
pub fn write_dump(buf: &mut [u8], value: &impl Display) -> usize {
    let Some(room) = buf.len().checked_sub(1) else {
        return 0;
    };

    let rendered = value.to_string();
    let mut end = rendered.len().min(room);
    while !rendered.is_char_boundary(end) {
        end -= 1;
    }

    buf[..end].copy_from_slice(&rendered.as_bytes()[..end]);
    buf[end] = 0;
    end
}

/// `Label([0]a, [1]b, )`
struct Indexed<'a, T>(&'a str, &'a [T]);

impl<T: Display> Display for Indexed<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.0)?;
        for (i, item) in self.1.iter().enumerate() {
            write!(f, "[{i}]{item}, ")?;
        }
        f.write_char(')')
    }
}

fn indexed<'a, T: Copy, const N: usize>(
    label: &'a str,
    list: &'a BoundedList<T, N>,
) -> Indexed<'a, T> {
    Indexed(label, list.as_slice())
}

/// `label(key:value, )`
struct Pairs<'a, const N: usize>(&'a str, &'a BoundedList<UpsfKeyValue, N>);

impl<const N: usize> Display for Pairs<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.0)?;
        for kv in self.1.as_slice() {
            write!(f, "{}:{}, ", kv.key, kv.value)?;
        }
        f.write_char(')')
    }
}

impl Display for UpsfMetaData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MetaData(desc={}, DerivedState={})",
            self.description,
            name_str(derived_state_name(self.derived_state))
        )
    }
}

impl Display for UpsfMaintenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Maintenance(req={})",
            name_str(maintenance_req_name(self.maintenance_req))
        )
    }
}

impl Display for UpsfEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint(name={}", self.endpoint_name)?;
        match self.spec() {
            Ok(None) => {}
            Ok(Some(EndpointSpec::Vtep(v))) => write!(
                f,
                ", Vtep(ip_address={}, udp_port={}, vni={})",
                v.ip_address, v.udp_port, v.vni
            )?,
            Ok(Some(EndpointSpec::L2vpn(v))) => write!(f, ", L2vpn(vpn_id={})", v.vpn_id)?,
            Ok(Some(EndpointSpec::PortVlan(v))) => write!(
                f,
                ", PortVlan(logical_port={}, svlan={}, cvlan={})",
                v.logical_port, v.svlan, v.cvlan
            )?,
            Err(tag) => write!(f, ", ep_type={} invalid", tag.0)?,
        }
        f.write_char(')')
    }
}

impl Display for UpsfServiceGateway {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceGateway(name={}, {})", self.name, self.metadata)
    }
}

impl Display for UpsfServiceGatewayUserPlane {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let spec = &self.spec;
        let status = &self.status;
        write!(
            f,
            "ServiceGatewayUserPlane(name={}, sg_name={}, {}, {}, ",
            self.name, self.service_gateway_name, self.metadata, self.maintenance
        )?;
        write!(
            f,
            "Spec(max_session_count={}, max_shards={}, {}, default_endpoint={}), ",
            spec.max_session_count,
            spec.max_shards,
            indexed("SupportedServiceGroup", &spec.supported_service_group),
            spec.default_endpoint
        )?;
        write!(
            f,
            "Status(allocated_session_count={}, allocated_shards={}))",
            status.allocated_session_count, status.allocated_shards
        )
    }
}

impl Display for UpsfTrafficSteeringFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrafficSteeringFunction(name={}, {}, Spec(default_endpoint={}))",
            self.name, self.metadata, self.spec.default_endpoint
        )
    }
}

impl Display for NcTopology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NcTopology::SsPtp(s) => write!(
                f,
                "SsPtp=SsPtpSpec({}, TsfEndpoint({}))",
                indexed("SgUpEndpoints", &s.sgup_endpoint),
                s.tsf_endpoint
            ),
            NcTopology::SsMptp(s) => write!(
                f,
                "SsMptp=SsMptpSpec({}, {})",
                indexed("SgUpEndpoints", &s.sgup_endpoint),
                indexed("TsfEndpoints", &s.tsf_endpoint)
            ),
            NcTopology::MsPtp(s) => write!(
                f,
                "MsPtp=MsPtpSpec(SgUpEndpoint({}), TsfEndpoint({}))",
                s.sgup_endpoint, s.tsf_endpoint
            ),
            NcTopology::MsMptp(s) => write!(
                f,
                "MsMptp=MsMptpSpec(SgUpEndpoint({}), {})",
                s.sgup_endpoint,
                indexed("TsfEndpoints", &s.tsf_endpoint)
            ),
        }
    }
}

impl Display for UpsfNetworkConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NetworkConnection(name={}, {}, {}, Spec(max_supp_quality={}, ",
            self.name, self.metadata, self.maintenance, self.spec.maximum_supported_quality
        )?;
        match self.spec.topology() {
            Ok(topology) => write!(f, "{topology}")?,
            Err(tag) => write!(f, "nc_spec_type={} invalid", tag.0)?,
        }
        write!(
            f,
            "), Status({}, allocated_shards={}))",
            Pairs("nc_active", &self.status.nc_active),
            self.status.allocated_shards
        )
    }
}

impl Display for UpsfShard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let spec = &self.spec;
        let status = &self.status;
        write!(f, "Shard(name={}, {}, ", self.name, self.metadata)?;
        write!(
            f,
            "Spec(max_session_count={}, virtual_mac={}, DesiredState(sgup={}, {}), {}), ",
            spec.max_session_count,
            spec.virtual_mac,
            spec.desired_state.service_gateway_user_plane,
            indexed("NetworkConnections", &spec.desired_state.network_connection),
            indexed("Prefixes", &spec.prefix)
        )?;
        write!(
            f,
            "Status(allocated_session_count={}, maximum_allocated_quality={}, CurrentState(sgup={}, {})), ",
            status.allocated_session_count,
            status.maximum_allocated_quality,
            status.current_state.service_gateway_user_plane,
            Pairs("TsfNetworkConnections", &status.current_state.tsf_network_connection)
        )?;
        write!(f, "Mbb(State={}))", name_str(mbb_state_name(self.mbb.mbb_state)))
    }
}

impl Display for UpsfSessionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let spec = &self.spec;
        let filter = &spec.session_filter;
        let current = &self.status.current_state;
        write!(f, "SessionContext(name={}, {}, ", self.name, self.metadata)?;
        write!(
            f,
            "Spec(tsf={}, {}, required_quality={}, circuit_id={}, remote_id={}, ",
            spec.traffic_steering_function,
            indexed("RequiredServiceGroups", &spec.required_service_group),
            spec.required_quality,
            spec.circuit_id,
            spec.remote_id
        )?;
        write!(
            f,
            "SessionFilter(source_mac_address={}, svlan={}, cvlan={}), DesiredState(shard={})), ",
            filter.source_mac_address, filter.svlan, filter.cvlan, spec.desired_state.shard
        )?;
        write!(
            f,
            "Status(CurrentState(up_shard={}, tsf_shard={})))",
            current.user_plane_shard, current.tsf_shard
        )
    }
}

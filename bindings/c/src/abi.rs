// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Fixed layout records shared with C callers.
//!
//! Every type here is `#[repr(C)]`, `Copy`, and mirrors a typedef in
//! `include/upsf.h`. Variable length data lives in [`FixedString`] and
//! [`BoundedList`]; unions are only read through the accessors that match
//! their tag ([`UpsfEndpoint::spec`], [`UpsfNetworkConnectionSpec::topology`]).

use std::ffi::c_int;
use std::fmt;

use thiserror::Error;

pub type UpsfHandle = c_int;

pub const UPSF_INVALID_HANDLE: UpsfHandle = -1;

pub const UPSF_MAX_STRING_SIZE: usize = 64;
pub const UPSF_MAX_NUM_REQUIRED_SERVICE_GROUPS: usize = 16;
pub const UPSF_MAX_NUM_NETWORK_CONNECTIONS: usize = 16;
pub const UPSF_MAX_NUM_DESIRED_NETWORK_CONNECTIONS: usize = 16;
pub const UPSF_MAX_NUM_TSF_NETWORK_CONNECTIONS: usize = 16;
pub const UPSF_MAX_NUM_IP_PREFIXES: usize = 16;
pub const UPSF_MAX_NUM_SUPPORTED_SERVICE_GROUPS: usize = 16;
pub const UPSF_MAX_NUM_ENDPOINTS: usize = 16;

pub const UPSF_EP_TYPE_NONE: c_int = 0;
pub const UPSF_EP_TYPE_VTEP: c_int = 1;
pub const UPSF_EP_TYPE_L2VPN: c_int = 2;
pub const UPSF_EP_TYPE_PORT_VLAN: c_int = 3;

pub const UPSF_NC_SPEC_TYPE_NONE: c_int = 0;
pub const UPSF_NC_SPEC_TYPE_SS_PTP: c_int = 1;
pub const UPSF_NC_SPEC_TYPE_SS_MPTP: c_int = 2;
pub const UPSF_NC_SPEC_TYPE_MS_PTP: c_int = 3;
pub const UPSF_NC_SPEC_TYPE_MS_MPTP: c_int = 4;

/// NUL terminated string of at most `UPSF_MAX_STRING_SIZE - 1` bytes.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FixedString {
    pub str: [u8; UPSF_MAX_STRING_SIZE],
    pub len: usize,
}

impl Default for FixedString {
    fn default() -> Self {
        FixedString {
            str: [0; UPSF_MAX_STRING_SIZE],
            len: 0,
        }
    }
}

impl FixedString {
    pub fn new(s: &str) -> Self {
        let mut fixed = FixedString::default();
        fixed.set(s);
        fixed
    }

    /// Replaces the content with `s`, cut at a character boundary so that
    /// the terminating NUL fits. Returns true if `s` was truncated.
    pub fn set(&mut self, s: &str) -> bool {
        let mut end = s.len().min(UPSF_MAX_STRING_SIZE - 1);
        while !s.is_char_boundary(end) {
            end -= 1;
        }

        self.str = [0; UPSF_MAX_STRING_SIZE];
        self.str[..end].copy_from_slice(&s.as_bytes()[..end]);
        self.len = end;
        end < s.len()
    }

    /// Content bytes. A zero `len` means the caller filled the buffer
    /// without setting it, so the first NUL decides.
    pub fn as_bytes(&self) -> &[u8] {
        let limit = match self.len {
            0 => UPSF_MAX_STRING_SIZE,
            len => len.min(UPSF_MAX_STRING_SIZE),
        };
        let bytes = &self.str[..limit];
        match bytes.iter().position(|b| *b == 0) {
            Some(nul) => &bytes[..nul],
            None => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl PartialEq for FixedString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for FixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl fmt::Display for FixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("bounded list is full ({capacity} elements)")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// Array of up to `N` elements plus the number in use.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BoundedList<T: Copy, const N: usize> {
    pub items: [T; N],
    pub count: usize,
}

impl<T: Copy + Default, const N: usize> Default for BoundedList<T, N> {
    fn default() -> Self {
        BoundedList {
            items: [T::default(); N],
            count: 0,
        }
    }
}

impl<T: Copy, const N: usize> BoundedList<T, N> {
    pub const CAPACITY: usize = N;

    pub fn push(&mut self, item: T) -> Result<(), CapacityExceeded> {
        if self.count >= N {
            return Err(CapacityExceeded { capacity: N });
        }
        self.items[self.count] = item;
        self.count += 1;
        Ok(())
    }

    /// Elements in use. A count above `N` is clamped.
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.count.min(N)]
    }

    pub fn len(&self) -> usize {
        self.count.min(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy + PartialEq, const N: usize> PartialEq for BoundedList<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Copy + fmt::Debug, const N: usize> fmt::Debug for BoundedList<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfKeyValue {
    pub key: FixedString,
    pub value: FixedString,
}

pub type StringList<const N: usize> = BoundedList<FixedString, N>;

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfMetaData {
    pub description: FixedString,
    pub derived_state: c_int,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfMaintenance {
    pub maintenance_req: c_int,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfVtep {
    pub ip_address: FixedString,
    pub udp_port: i32,
    pub vni: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfL2vpn {
    pub vpn_id: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfPortVlan {
    pub logical_port: FixedString,
    pub svlan: i32,
    pub cvlan: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSessionFilter {
    pub source_mac_address: FixedString,
    pub svlan: i32,
    pub cvlan: i32,
}

/// Transport arm of an endpoint, selected by `ep_type`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union UpsfEndpointSpec {
    pub vtep: UpsfVtep,
    pub l2vpn: UpsfL2vpn,
    pub port_vlan: UpsfPortVlan,
}

impl Default for UpsfEndpointSpec {
    fn default() -> Self {
        UpsfEndpointSpec {
            vtep: UpsfVtep::default(),
        }
    }
}

/// A tag value with no matching union arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownTag(pub c_int);

/// Decoded endpoint transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointSpec {
    Vtep(UpsfVtep),
    L2vpn(UpsfL2vpn),
    PortVlan(UpsfPortVlan),
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct UpsfEndpoint {
    pub endpoint_name: FixedString,
    pub ep_type: c_int,
    pub ep_spec: UpsfEndpointSpec,
}

impl UpsfEndpoint {
    /// The populated transport, `None` for `UPSF_EP_TYPE_NONE`.
    pub fn spec(&self) -> Result<Option<EndpointSpec>, UnknownTag> {
        // SAFETY: every arm is plain data valid for any bit pattern, and
        // the arm read is the one named by the tag.
        let spec = unsafe {
            match self.ep_type {
                UPSF_EP_TYPE_NONE => None,
                UPSF_EP_TYPE_VTEP => Some(EndpointSpec::Vtep(self.ep_spec.vtep)),
                UPSF_EP_TYPE_L2VPN => Some(EndpointSpec::L2vpn(self.ep_spec.l2vpn)),
                UPSF_EP_TYPE_PORT_VLAN => Some(EndpointSpec::PortVlan(self.ep_spec.port_vlan)),
                other => return Err(UnknownTag(other)),
            }
        };
        Ok(spec)
    }

    pub fn set_spec(&mut self, spec: Option<EndpointSpec>) {
        let (ep_type, ep_spec) = match spec {
            None => (UPSF_EP_TYPE_NONE, UpsfEndpointSpec::default()),
            Some(EndpointSpec::Vtep(vtep)) => (UPSF_EP_TYPE_VTEP, UpsfEndpointSpec { vtep }),
            Some(EndpointSpec::L2vpn(l2vpn)) => (UPSF_EP_TYPE_L2VPN, UpsfEndpointSpec { l2vpn }),
            Some(EndpointSpec::PortVlan(port_vlan)) => {
                (UPSF_EP_TYPE_PORT_VLAN, UpsfEndpointSpec { port_vlan })
            }
        };
        self.ep_type = ep_type;
        self.ep_spec = ep_spec;
    }
}

impl PartialEq for UpsfEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint_name == other.endpoint_name
            && self.ep_type == other.ep_type
            && self.spec() == other.spec()
    }
}

impl fmt::Debug for UpsfEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpsfEndpoint")
            .field("endpoint_name", &self.endpoint_name)
            .field("spec", &self.spec())
            .finish()
    }
}

pub type EndpointList = BoundedList<UpsfEndpoint, UPSF_MAX_NUM_ENDPOINTS>;

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfServiceGateway {
    pub name: FixedString,
    pub metadata: UpsfMetaData,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfServiceGatewayUserPlaneSpec {
    pub max_session_count: i32,
    pub max_shards: i32,
    pub supported_service_group: StringList<UPSF_MAX_NUM_SUPPORTED_SERVICE_GROUPS>,
    pub default_endpoint: UpsfEndpoint,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfServiceGatewayUserPlaneStatus {
    pub allocated_session_count: i32,
    pub allocated_shards: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfServiceGatewayUserPlane {
    pub name: FixedString,
    pub service_gateway_name: FixedString,
    pub metadata: UpsfMetaData,
    pub maintenance: UpsfMaintenance,
    pub spec: UpsfServiceGatewayUserPlaneSpec,
    pub status: UpsfServiceGatewayUserPlaneStatus,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfTrafficSteeringFunctionSpec {
    pub default_endpoint: UpsfEndpoint,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfTrafficSteeringFunction {
    pub name: FixedString,
    pub metadata: UpsfMetaData,
    pub spec: UpsfTrafficSteeringFunctionSpec,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSsPtpSpec {
    pub sgup_endpoint: EndpointList,
    pub tsf_endpoint: UpsfEndpoint,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSsMptpSpec {
    pub sgup_endpoint: EndpointList,
    pub tsf_endpoint: EndpointList,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfMsPtpSpec {
    pub sgup_endpoint: UpsfEndpoint,
    pub tsf_endpoint: UpsfEndpoint,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfMsMptpSpec {
    pub sgup_endpoint: UpsfEndpoint,
    pub tsf_endpoint: EndpointList,
}

/// Topology arm of a network connection, selected by `nc_spec_type`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union UpsfNcSpec {
    pub ss_ptp: UpsfSsPtpSpec,
    pub ss_mptp: UpsfSsMptpSpec,
    pub ms_ptp: UpsfMsPtpSpec,
    pub ms_mptp: UpsfMsMptpSpec,
}

impl Default for UpsfNcSpec {
    fn default() -> Self {
        UpsfNcSpec {
            ss_mptp: UpsfSsMptpSpec::default(),
        }
    }
}

/// Decoded network connection topology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NcTopology {
    SsPtp(UpsfSsPtpSpec),
    SsMptp(UpsfSsMptpSpec),
    MsPtp(UpsfMsPtpSpec),
    MsMptp(UpsfMsMptpSpec),
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct UpsfNetworkConnectionSpec {
    pub maximum_supported_quality: i32,
    pub nc_spec_type: c_int,
    pub nc_spec: UpsfNcSpec,
}

impl UpsfNetworkConnectionSpec {
    /// The populated topology. `UPSF_NC_SPEC_TYPE_NONE` is reported like
    /// any other tag without an arm.
    pub fn topology(&self) -> Result<NcTopology, UnknownTag> {
        // SAFETY: as for endpoints, plain data arms read under their tag.
        let topology = unsafe {
            match self.nc_spec_type {
                UPSF_NC_SPEC_TYPE_SS_PTP => NcTopology::SsPtp(self.nc_spec.ss_ptp),
                UPSF_NC_SPEC_TYPE_SS_MPTP => NcTopology::SsMptp(self.nc_spec.ss_mptp),
                UPSF_NC_SPEC_TYPE_MS_PTP => NcTopology::MsPtp(self.nc_spec.ms_ptp),
                UPSF_NC_SPEC_TYPE_MS_MPTP => NcTopology::MsMptp(self.nc_spec.ms_mptp),
                other => return Err(UnknownTag(other)),
            }
        };
        Ok(topology)
    }

    pub fn set_topology(&mut self, topology: NcTopology) {
        let (nc_spec_type, nc_spec) = match topology {
            NcTopology::SsPtp(ss_ptp) => (UPSF_NC_SPEC_TYPE_SS_PTP, UpsfNcSpec { ss_ptp }),
            NcTopology::SsMptp(ss_mptp) => (UPSF_NC_SPEC_TYPE_SS_MPTP, UpsfNcSpec { ss_mptp }),
            NcTopology::MsPtp(ms_ptp) => (UPSF_NC_SPEC_TYPE_MS_PTP, UpsfNcSpec { ms_ptp }),
            NcTopology::MsMptp(ms_mptp) => (UPSF_NC_SPEC_TYPE_MS_MPTP, UpsfNcSpec { ms_mptp }),
        };
        self.nc_spec_type = nc_spec_type;
        self.nc_spec = nc_spec;
    }
}

impl PartialEq for UpsfNetworkConnectionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.maximum_supported_quality == other.maximum_supported_quality
            && self.nc_spec_type == other.nc_spec_type
            && self.topology() == other.topology()
    }
}

impl fmt::Debug for UpsfNetworkConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpsfNetworkConnectionSpec")
            .field("maximum_supported_quality", &self.maximum_supported_quality)
            .field("topology", &self.topology())
            .finish()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfNetworkConnectionStatus {
    pub nc_active: BoundedList<UpsfKeyValue, UPSF_MAX_NUM_NETWORK_CONNECTIONS>,
    pub allocated_shards: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfNetworkConnection {
    pub name: FixedString,
    pub metadata: UpsfMetaData,
    pub maintenance: UpsfMaintenance,
    pub spec: UpsfNetworkConnectionSpec,
    pub status: UpsfNetworkConnectionStatus,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfShardDesiredState {
    pub service_gateway_user_plane: FixedString,
    pub network_connection: StringList<UPSF_MAX_NUM_DESIRED_NETWORK_CONNECTIONS>,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfShardSpec {
    pub max_session_count: i32,
    pub virtual_mac: FixedString,
    pub desired_state: UpsfShardDesiredState,
    pub prefix: StringList<UPSF_MAX_NUM_IP_PREFIXES>,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfShardCurrentState {
    pub service_gateway_user_plane: FixedString,
    pub tsf_network_connection: BoundedList<UpsfKeyValue, UPSF_MAX_NUM_TSF_NETWORK_CONNECTIONS>,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfShardStatus {
    pub allocated_session_count: i32,
    pub maximum_allocated_quality: i32,
    pub current_state: UpsfShardCurrentState,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfShardMbb {
    pub mbb_state: c_int,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfShard {
    pub name: FixedString,
    pub metadata: UpsfMetaData,
    pub spec: UpsfShardSpec,
    pub status: UpsfShardStatus,
    pub mbb: UpsfShardMbb,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSessionContextDesiredState {
    pub shard: FixedString,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSessionContextSpec {
    pub traffic_steering_function: FixedString,
    pub required_service_group: StringList<UPSF_MAX_NUM_REQUIRED_SERVICE_GROUPS>,
    pub required_quality: i32,
    pub circuit_id: FixedString,
    pub remote_id: FixedString,
    pub session_filter: UpsfSessionFilter,
    pub desired_state: UpsfSessionContextDesiredState,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSessionContextCurrentState {
    pub user_plane_shard: FixedString,
    pub tsf_shard: FixedString,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSessionContextStatus {
    pub current_state: UpsfSessionContextCurrentState,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct UpsfSessionContext {
    pub name: FixedString,
    pub metadata: UpsfMetaData,
    pub spec: UpsfSessionContextSpec,
    pub status: UpsfSessionContextStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_string_truncates_at_char_boundary() {
        let mut s = FixedString::default();
        assert!(!s.set("short"));
        assert_eq!(s.len, 5);
        assert_eq!(s.to_string_lossy(), "short");

        let long = "x".repeat(62) + "é";
        assert!(s.set(&long));
        assert_eq!(s.len, 62);
        assert_eq!(s.str[62], 0);
        assert_eq!(s.str[63], 0);
    }

    #[test]
    fn test_fixed_string_reads_without_len() {
        let mut s = FixedString::default();
        s.str[..3].copy_from_slice(b"abc");
        assert_eq!(s.len, 0);
        assert_eq!(s.to_string_lossy(), "abc");

        // a len past the content stops at the NUL
        s.len = 40;
        assert_eq!(s.as_bytes(), b"abc");

        // a full buffer without NUL is read to its end
        s.str = [b'z'; UPSF_MAX_STRING_SIZE];
        s.len = 1000;
        assert_eq!(s.as_bytes().len(), UPSF_MAX_STRING_SIZE);
    }

    #[test]
    fn test_bounded_list_push_and_clamp() {
        let mut list = BoundedList::<i32, 2>::default();
        assert!(list.is_empty());
        list.push(1).unwrap();
        list.push(2).unwrap();
        assert_eq!(list.push(3), Err(CapacityExceeded { capacity: 2 }));
        assert_eq!(list.as_slice(), &[1, 2]);

        list.count = 99;
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_endpoint_union_tag() {
        let mut ep = UpsfEndpoint::default();
        assert_eq!(ep.spec(), Ok(None));

        ep.set_spec(Some(EndpointSpec::L2vpn(UpsfL2vpn { vpn_id: 7 })));
        assert_eq!(ep.ep_type, UPSF_EP_TYPE_L2VPN);
        assert_eq!(
            ep.spec(),
            Ok(Some(EndpointSpec::L2vpn(UpsfL2vpn { vpn_id: 7 })))
        );

        ep.ep_type = 9;
        assert_eq!(ep.spec(), Err(UnknownTag(9)));
    }

    #[test]
    fn test_nc_topology_tag() {
        let mut spec = UpsfNetworkConnectionSpec::default();
        assert_eq!(spec.topology(), Err(UnknownTag(UPSF_NC_SPEC_TYPE_NONE)));

        let ms_ptp = UpsfMsPtpSpec::default();
        spec.set_topology(NcTopology::MsPtp(ms_ptp));
        assert_eq!(spec.nc_spec_type, UPSF_NC_SPEC_TYPE_MS_PTP);
        assert_eq!(spec.topology(), Ok(NcTopology::MsPtp(ms_ptp)));
    }
}

// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use super::common::{
    endpoint_from_abi, maintenance_from_abi, maintenance_to_abi, metadata_from_abi,
    metadata_to_abi, optional_endpoint_to_abi, session_filter_from_abi, session_filter_to_abi,
};
use super::{AbiRecord, MarshalError, fill_map, fill_strings, fixed, map, strings};
use crate::abi::{
    FixedString, UpsfServiceGateway, UpsfServiceGatewayUserPlane, UpsfServiceGatewayUserPlaneSpec,
    UpsfServiceGatewayUserPlaneStatus, UpsfSessionContext, UpsfSessionContextCurrentState,
    UpsfSessionContextDesiredState, UpsfSessionContextSpec, UpsfSessionContextStatus, UpsfShard,
    UpsfShardCurrentState, UpsfShardDesiredState, UpsfShardMbb, UpsfShardSpec, UpsfShardStatus,
    UpsfTrafficSteeringFunction, UpsfTrafficSteeringFunctionSpec,
};
use upsf_client::proto::{
    ServiceGateway, ServiceGatewayUserPlane, SessionContext, Shard, TrafficSteeringFunction,
    service_gateway_user_plane, session_context, shard, traffic_steering_function,
};

impl AbiRecord for UpsfServiceGateway {
    type Message = ServiceGateway;

    fn from_message(message: &ServiceGateway) -> Result<Self, MarshalError> {
        Ok(UpsfServiceGateway {
            name: fixed("name", &message.name),
            metadata: metadata_to_abi(message.metadata.as_ref()),
        })
    }

    fn to_message(&self) -> Result<ServiceGateway, MarshalError> {
        Ok(ServiceGateway {
            name: self.name.to_string_lossy(),
            metadata: Some(metadata_from_abi(&self.metadata)),
        })
    }

    fn name(&self) -> &FixedString {
        &self.name
    }
}

impl AbiRecord for UpsfServiceGatewayUserPlane {
    type Message = ServiceGatewayUserPlane;

    fn from_message(message: &ServiceGatewayUserPlane) -> Result<Self, MarshalError> {
        let mut record = UpsfServiceGatewayUserPlane {
            name: fixed("name", &message.name),
            service_gateway_name: fixed("service_gateway_name", &message.service_gateway_name),
            metadata: metadata_to_abi(message.metadata.as_ref()),
            maintenance: maintenance_to_abi(message.maintenance.as_ref()),
            ..Default::default()
        };

        if let Some(spec) = &message.spec {
            record.spec = UpsfServiceGatewayUserPlaneSpec {
                max_session_count: spec.max_session_count,
                max_shards: spec.max_shards,
                default_endpoint: optional_endpoint_to_abi(
                    "spec.default_endpoint",
                    spec.default_endpoint.as_ref(),
                )?,
                ..Default::default()
            };
            fill_strings(
                "spec.supported_service_group",
                &spec.supported_service_group,
                &mut record.spec.supported_service_group,
            )?;
        }

        if let Some(status) = &message.status {
            record.status = UpsfServiceGatewayUserPlaneStatus {
                allocated_session_count: status.allocated_session_count,
                allocated_shards: status.allocated_shards,
            };
        }

        Ok(record)
    }

    fn to_message(&self) -> Result<ServiceGatewayUserPlane, MarshalError> {
        Ok(ServiceGatewayUserPlane {
            name: self.name.to_string_lossy(),
            service_gateway_name: self.service_gateway_name.to_string_lossy(),
            metadata: Some(metadata_from_abi(&self.metadata)),
            maintenance: Some(maintenance_from_abi(&self.maintenance)),
            spec: Some(service_gateway_user_plane::Spec {
                max_session_count: self.spec.max_session_count,
                max_shards: self.spec.max_shards,
                supported_service_group: strings(&self.spec.supported_service_group),
                default_endpoint: endpoint_from_abi(
                    "spec.default_endpoint",
                    &self.spec.default_endpoint,
                )?,
            }),
            status: Some(service_gateway_user_plane::Status {
                allocated_session_count: self.status.allocated_session_count,
                allocated_shards: self.status.allocated_shards,
            }),
        })
    }

    fn name(&self) -> &FixedString {
        &self.name
    }
}

impl AbiRecord for UpsfTrafficSteeringFunction {
    type Message = TrafficSteeringFunction;

    fn from_message(message: &TrafficSteeringFunction) -> Result<Self, MarshalError> {
        let default_endpoint = message
            .spec
            .as_ref()
            .and_then(|spec| spec.default_endpoint.as_ref());

        Ok(UpsfTrafficSteeringFunction {
            name: fixed("name", &message.name),
            metadata: metadata_to_abi(message.metadata.as_ref()),
            spec: UpsfTrafficSteeringFunctionSpec {
                default_endpoint: optional_endpoint_to_abi(
                    "spec.default_endpoint",
                    default_endpoint,
                )?,
            },
        })
    }

    fn to_message(&self) -> Result<TrafficSteeringFunction, MarshalError> {
        Ok(TrafficSteeringFunction {
            name: self.name.to_string_lossy(),
            metadata: Some(metadata_from_abi(&self.metadata)),
            spec: Some(traffic_steering_function::Spec {
                default_endpoint: endpoint_from_abi(
                    "spec.default_endpoint",
                    &self.spec.default_endpoint,
                )?,
            }),
        })
    }

    fn name(&self) -> &FixedString {
        &self.name
    }
}

impl AbiRecord for UpsfShard {
    type Message = Shard;

    fn from_message(message: &Shard) -> Result<Self, MarshalError> {
        let mut record = UpsfShard {
            name: fixed("name", &message.name),
            metadata: metadata_to_abi(message.metadata.as_ref()),
            mbb: UpsfShardMbb {
                mbb_state: message.mbb.as_ref().map(|m| m.mbb_state).unwrap_or_default(),
            },
            ..Default::default()
        };

        if let Some(spec) = &message.spec {
            record.spec = UpsfShardSpec {
                max_session_count: spec.max_session_count,
                virtual_mac: fixed("spec.virtual_mac", &spec.virtual_mac),
                ..Default::default()
            };
            if let Some(desired) = &spec.desired_state {
                record.spec.desired_state = UpsfShardDesiredState {
                    service_gateway_user_plane: fixed(
                        "spec.desired_state.service_gateway_user_plane",
                        &desired.service_gateway_user_plane,
                    ),
                    ..Default::default()
                };
                fill_strings(
                    "spec.desired_state.network_connection",
                    &desired.network_connection,
                    &mut record.spec.desired_state.network_connection,
                )?;
            }
            fill_strings("spec.prefix", &spec.prefix, &mut record.spec.prefix)?;
        }

        if let Some(status) = &message.status {
            record.status = UpsfShardStatus {
                allocated_session_count: status.allocated_session_count,
                maximum_allocated_quality: status.maximum_allocated_quality,
                ..Default::default()
            };
            if let Some(current) = &status.current_state {
                record.status.current_state = UpsfShardCurrentState {
                    service_gateway_user_plane: fixed(
                        "status.current_state.service_gateway_user_plane",
                        &current.service_gateway_user_plane,
                    ),
                    ..Default::default()
                };
                fill_map(
                    "status.current_state.tsf_network_connection",
                    &current.tsf_network_connection,
                    &mut record.status.current_state.tsf_network_connection,
                    String::clone,
                )?;
            }
        }

        Ok(record)
    }

    fn to_message(&self) -> Result<Shard, MarshalError> {
        let spec = &self.spec;
        let status = &self.status;

        Ok(Shard {
            name: self.name.to_string_lossy(),
            metadata: Some(metadata_from_abi(&self.metadata)),
            spec: Some(shard::Spec {
                max_session_count: spec.max_session_count,
                virtual_mac: spec.virtual_mac.to_string_lossy(),
                desired_state: Some(shard::spec::DesiredState {
                    service_gateway_user_plane: spec
                        .desired_state
                        .service_gateway_user_plane
                        .to_string_lossy(),
                    network_connection: strings(&spec.desired_state.network_connection),
                }),
                prefix: strings(&spec.prefix),
            }),
            status: Some(shard::Status {
                allocated_session_count: status.allocated_session_count,
                maximum_allocated_quality: status.maximum_allocated_quality,
                current_state: Some(shard::status::CurrentState {
                    service_gateway_user_plane: status
                        .current_state
                        .service_gateway_user_plane
                        .to_string_lossy(),
                    tsf_network_connection: map(
                        &status.current_state.tsf_network_connection,
                        str::to_string,
                    ),
                }),
            }),
            mbb: Some(shard::Mbb {
                mbb_state: self.mbb.mbb_state,
            }),
        })
    }

    fn name(&self) -> &FixedString {
        &self.name
    }
}

impl AbiRecord for UpsfSessionContext {
    type Message = SessionContext;

    fn from_message(message: &SessionContext) -> Result<Self, MarshalError> {
        let mut record = UpsfSessionContext {
            name: fixed("name", &message.name),
            metadata: metadata_to_abi(message.metadata.as_ref()),
            ..Default::default()
        };

        if let Some(spec) = &message.spec {
            record.spec = session_context_spec_to_abi(spec)?;
        }

        if let Some(current) = message
            .status
            .as_ref()
            .and_then(|status| status.current_state.as_ref())
        {
            record.status = UpsfSessionContextStatus {
                current_state: UpsfSessionContextCurrentState {
                    user_plane_shard: fixed(
                        "status.current_state.user_plane_shard",
                        &current.user_plane_shard,
                    ),
                    tsf_shard: fixed("status.current_state.tsf_shard", &current.tsf_shard),
                },
            };
        }

        Ok(record)
    }

    fn to_message(&self) -> Result<SessionContext, MarshalError> {
        let current = &self.status.current_state;

        Ok(SessionContext {
            name: self.name.to_string_lossy(),
            metadata: Some(metadata_from_abi(&self.metadata)),
            spec: Some(session_context_spec_from_abi(&self.spec)),
            status: Some(session_context::Status {
                current_state: Some(session_context::status::CurrentState {
                    user_plane_shard: current.user_plane_shard.to_string_lossy(),
                    tsf_shard: current.tsf_shard.to_string_lossy(),
                }),
            }),
        })
    }

    fn name(&self) -> &FixedString {
        &self.name
    }
}

/// A lookup query carries only this part of the record.
pub(crate) fn session_context_spec_to_abi(
    spec: &session_context::Spec,
) -> Result<UpsfSessionContextSpec, MarshalError> {
    let mut record = UpsfSessionContextSpec {
        traffic_steering_function: fixed(
            "spec.traffic_steering_function",
            &spec.traffic_steering_function,
        ),
        required_quality: spec.required_quality,
        circuit_id: fixed("spec.circuit_id", &spec.circuit_id),
        remote_id: fixed("spec.remote_id", &spec.remote_id),
        session_filter: session_filter_to_abi(spec.session_filter.as_ref()),
        desired_state: UpsfSessionContextDesiredState {
            shard: spec
                .desired_state
                .as_ref()
                .map(|d| fixed("spec.desired_state.shard", &d.shard))
                .unwrap_or_default(),
        },
        ..Default::default()
    };
    fill_strings(
        "spec.required_service_group",
        &spec.required_service_group,
        &mut record.required_service_group,
    )?;
    Ok(record)
}

pub(crate) fn session_context_spec_from_abi(spec: &UpsfSessionContextSpec) -> session_context::Spec {
    session_context::Spec {
        traffic_steering_function: spec.traffic_steering_function.to_string_lossy(),
        required_service_group: strings(&spec.required_service_group),
        required_quality: spec.required_quality,
        circuit_id: spec.circuit_id.to_string_lossy(),
        remote_id: spec.remote_id.to_string_lossy(),
        session_filter: Some(session_filter_from_abi(&spec.session_filter)),
        desired_state: Some(session_context::spec::DesiredState {
            shard: spec.desired_state.shard.to_string_lossy(),
        }),
    }
}

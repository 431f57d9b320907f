//! Typed decoding of the fixed-shape REST payloads returned through `cf curl`.
//!
//! A shape mismatch is an API contract change and surfaces as
//! [`HarnessError::Decode`]; an empty list where one element is required
//! surfaces as [`HarnessError::EmptyResult`]. Neither is retried.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{HarnessError, HarnessResult};
use crate::model::StatsSample;

/// `GET /v2/apps?q=name:<name>`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppsResponse {
    pub resources: Vec<AppResource>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppResource {
    pub metadata: AppMetadata,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppMetadata {
    /// API path of the app, e.g. `/v2/apps/<guid>`.
    pub url: String,
}

/// `GET /v2/routes?q=host:<host>`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoutesResponse {
    pub resources: Vec<RouteResource>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteResource {
    pub entity: RouteEntity,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteEntity {
    pub space_guid: String,
    pub domain_guid: String,
}

/// `POST /v2/routes`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteCreated {
    pub metadata: ResourceMetadata,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub guid: String,
}

/// `GET /v2/apps/<guid>/stats`, keyed by instance index.
pub type StatsResponse = BTreeMap<String, InstanceStats>;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InstanceStats {
    pub stats: InstanceNetwork,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InstanceNetwork {
    pub host: String,
    pub port: u16,
}

/// Deserialize `body` as `T`, naming `command` and `schema` on failure.
pub fn decode<T: DeserializeOwned>(
    command: &str,
    schema: &'static str,
    body: &str,
) -> HarnessResult<T> {
    serde_json::from_str(body).map_err(|source| HarnessError::Decode {
        command: command.to_string(),
        schema,
        body: body.to_string(),
        source,
    })
}

/// First element of a decoded list, or [`HarnessError::EmptyResult`].
pub fn first<T>(command: &str, what: &str, items: Vec<T>) -> HarnessResult<T> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| HarnessError::EmptyResult {
            command: command.to_string(),
            what: what.to_string(),
        })
}

/// API path of the first app in an app-list payload.
pub fn first_app_url(command: &str, body: &str) -> HarnessResult<String> {
    let apps: AppsResponse = decode(command, "app list", body)?;
    Ok(first(command, "app", apps.resources)?.metadata.url)
}

/// `(space_guid, domain_guid)` of the first route in a route-list payload.
pub fn first_route_space_and_domain(command: &str, body: &str) -> HarnessResult<(String, String)> {
    let routes: RoutesResponse = decode(command, "route list", body)?;
    let entity = first(command, "route", routes.resources)?.entity;
    Ok((entity.space_guid, entity.domain_guid))
}

/// Guid assigned to a newly created route.
pub fn created_route_guid(command: &str, body: &str) -> HarnessResult<String> {
    let created: RouteCreated = decode(command, "route creation", body)?;
    if created.metadata.guid.is_empty() {
        return Err(HarnessError::EmptyResult {
            command: command.to_string(),
            what: "route guid".to_string(),
        });
    }
    Ok(created.metadata.guid)
}

/// Network location of instance `index` in a stats payload.
pub fn instance_stats(command: &str, body: &str, index: u32) -> HarnessResult<StatsSample> {
    let mut stats: StatsResponse = decode(command, "stats map", body)?;
    let instance = stats
        .remove(&index.to_string())
        .ok_or_else(|| HarnessError::EmptyResult {
            command: command.to_string(),
            what: format!("stats for instance {index}"),
        })?;
    Ok(StatsSample {
        index,
        host: instance.stats.host,
        port: instance.stats.port,
    })
}

extern crate serde;

use crate::cloudflare::requests::Request;
use crate::errors::SpeedTestError;
use crate::results::EndpointMetadata;
use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt::Formatter;

/// Body of `/cdn-cgi/trace`.
///
/// Only the keys the engine reports on are kept; anything else the
/// endpoint sends is ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Trace {
    pub ip: Option<String>,
    pub loc: Option<String>,
    pub colo: Option<String>,
}

impl Trace {
    pub(crate) fn parse(body: &str) -> Self {
        body.lines()
            .filter_map(|line| line.trim().split_once('='))
            .fold(Trace::default(), |mut trace, (key, value)| {
                let value = Some(value.to_string());
                match key {
                    "ip" => trace.ip = value,
                    "loc" => trace.loc = value,
                    "colo" => trace.colo = value,
                    _ => {}
                }
                trace
            })
    }

    /// Endpoint metadata, provided the trace names both the client IP and
    /// the serving colo.
    pub(crate) fn into_metadata(self) -> Result<EndpointMetadata, SpeedTestError> {
        let ip = self.ip.ok_or_else(|| {
            SpeedTestError::endpoint("trace response did not include 'ip'")
        })?;
        let colo = self.colo.ok_or_else(|| {
            SpeedTestError::endpoint("trace response did not include 'colo'")
        })?;

        Ok(EndpointMetadata { ip, location: self.loc.unwrap_or_default(), colo })
    }
}

pub(crate) struct TraceRequest {}

impl Request for TraceRequest {
    type Response = Trace;

    fn endpoint(&self) -> Cow<'_, str> {
        "cdn-cgi/trace".into()
    }
}

impl<'de> Deserialize<'de> for Trace {
    fn deserialize<D>(deserializer: D) -> Result<Trace, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(TraceVisitor)
    }
}

struct TraceVisitor;

impl<'de> Visitor<'de> for TraceVisitor {
    type Value = Trace;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a newline-separated list of key=value pairs")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        Ok(Trace::parse(v))
    }
}

//! Geometry reprojection capability
//!
//! Coordinate transformation is an external collaborator: the deployment
//! wires in a real transformation service, the tests wire in stubs. The
//! codec only ever asks for the exchange target system.

use crate::app::models::Geometry;
use crate::error::{ExchangeError, Result};

/// Transforms geometry between spatial reference systems
pub trait Reprojector {
    fn reproject(&self, geometry: &Geometry, target_srid: u32) -> Result<Geometry>;
}

/// Reprojector for stores that already keep geometry in the exchange target
/// system; anything else is refused rather than silently relabeled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReprojector;

impl Reprojector for PassthroughReprojector {
    fn reproject(&self, geometry: &Geometry, target_srid: u32) -> Result<Geometry> {
        if geometry.srid() == target_srid {
            Ok(geometry.clone())
        } else {
            Err(ExchangeError::coercion(
                "geometry",
                format!(
                    "no transform available from srid {} to {}",
                    geometry.srid(),
                    target_srid
                ),
            ))
        }
    }
}

//! Device location is supplied from outside the core; permission handling
//! lives with whoever implements this trait.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::model::Coordinates;

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    /// Current coordinates, or `None` when no fix is available.
    async fn current_location(&self) -> Option<Coordinates>;
}

/// Location pinned at construction, e.g. a configured home position.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(Option<Coordinates>);

impl FixedLocation {
    pub fn new(coordinates: Coordinates) -> Self {
        Self(Some(coordinates))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Option<Coordinates> {
        self.0
    }
}

//! Mover records.
//!
//! A [`RoutedMover`] is a mover in transit: identity, route, and the tick the
//! route started. A [`FrozenMover`] is the static form a mover takes when its
//! region is unloaded or the world is saved, carrying everything needed to
//! put it back on a network later.

use crate::clock::Ticks;
use crate::geometry::{BlockPos, Vec3};
use crate::id::{ComponentId, MoverId, TransporterType};
use crate::route::Route;
use serde::{Deserialize, Serialize};

/// A mover travelling along a route through one network component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedMover {
    pub id: MoverId,
    pub transporter: TransporterType,
    /// The component whose mover set holds this record.
    pub component: ComponentId,
    pub route: Route,
    /// Tick at which the mover started along `route`.
    pub start: Ticks,
    /// Progress captured by a pre-save freeze, cleared again on resume.
    #[serde(default)]
    pub suspended: Option<Ticks>,
}

impl RoutedMover {
    /// Ticks travelled so far.
    pub fn progress(&self, now: Ticks) -> Ticks {
        self.suspended.unwrap_or_else(|| now.saturating_sub(self.start))
    }

    /// Current world position.
    pub fn position(&self, now: Ticks) -> Vec3 {
        self.route.position_at(self.progress(now))
    }

    /// Ticks left until arrival.
    pub fn remaining(&self, now: Ticks) -> Ticks {
        self.route.duration().saturating_sub(self.progress(now))
    }

    /// Capture this mover at `now` as durable state.
    pub fn freeze(&self, now: Ticks) -> FrozenMover {
        let progress = self.progress(now);
        FrozenMover {
            id: self.id,
            transporter: self.transporter.clone(),
            position: self.route.position_at(progress),
            route: self.route.clone(),
            progress,
        }
    }
}

/// Durable state of a mover that is not currently simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenMover {
    pub id: MoverId,
    pub transporter: TransporterType,
    pub route: Route,
    /// Ticks travelled when the mover was frozen.
    pub progress: Ticks,
    /// Interpolated world position at `progress`.
    pub position: Vec3,
}

impl FrozenMover {
    /// The block the mover was in when frozen.
    pub fn block(&self) -> BlockPos {
        BlockPos::containing(self.position)
    }

    /// Ticks the mover still had to travel.
    pub fn remaining(&self) -> Ticks {
        self.route.duration().saturating_sub(self.progress)
    }
}

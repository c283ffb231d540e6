// Scene-graph side of the pipeline: the sink that turns messages into entity
// moves and light colour changes.
//
// `World` is the capability the sink needs from the host's scene: look an
// entity up by name, read and write its position, recolour it. The sink
// never keeps handles between calls; every message resolves its target
// afresh, and a name that does not resolve is silently skipped.
//
// `SceneSink` applies:
// - `state`: move the named entity to (x, current y, z). If the action is
//   the reset token, log it. Nothing else happens on reset.
// - `light`: recolour the entity named `traffic_light` (green, amber, or red
//   for anything unrecognized). Entities without a renderer are left alone.
//
// `Scene` is a plain in-memory `World` used by the `ingest` binary and the
// tests. A real host (a game engine binding) would implement `World` over
// its own node tree instead.

use std::collections::BTreeMap;

use crosswalk_protocol::{LightColor, RESET_ACTION};
use tracing::{debug, info, trace};

use crate::dispatch::{Sink, StateUpdate};

/// Name of the entity that light messages recolour.
pub const TRAFFIC_LIGHT: &str = "traffic_light";

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Name-addressed access to a mutable scene.
pub trait World {
    type Handle: Copy;

    fn resolve(&self, name: &str) -> Option<Self::Handle>;

    fn position(&self, entity: Self::Handle) -> Vec3;

    fn set_position(&mut self, entity: Self::Handle, position: Vec3);

    /// Returns `false` if the entity has nothing to recolour.
    fn set_color(&mut self, entity: Self::Handle, color: LightColor) -> bool;
}

/// Applies messages to a `World`.
pub struct SceneSink<W> {
    world: W,
}

impl<W: World> SceneSink<W> {
    pub fn new(world: W) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn into_world(self) -> W {
        self.world
    }
}

impl<W: World> Sink for SceneSink<W> {
    fn apply_state(&mut self, update: StateUpdate<'_>) {
        let Some(entity) = self.world.resolve(update.agent_id) else {
            trace!(agent_id = update.agent_id, "no entity with that name");
            return;
        };
        let current = self.world.position(entity);
        self.world
            .set_position(entity, Vec3::new(update.x, current.y, update.z));

        if update.action == Some(RESET_ACTION) {
            info!(agent_id = update.agent_id, step = ?update.step, "reset received");
        }
    }

    fn apply_light(&mut self, state: &str) {
        let Some(lamp) = self.world.resolve(TRAFFIC_LIGHT) else {
            trace!("no traffic light in scene");
            return;
        };
        if !self.world.set_color(lamp, LightColor::from_state(state)) {
            debug!("traffic light has no renderer");
        }
    }
}

/// Index of an entity inside a `Scene`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub position: Vec3,
    /// Current colour; `None` for entities that cannot be recoloured.
    pub color: Option<LightColor>,
}

impl Entity {
    pub fn prop(position: Vec3) -> Self {
        Self {
            position,
            color: None,
        }
    }

    pub fn lamp(position: Vec3, color: LightColor) -> Self {
        Self {
            position,
            color: Some(color),
        }
    }
}

/// In-memory `World`: a flat list of named entities.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    entities: Vec<Entity>,
    names: BTreeMap<String, EntityId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// The crossing the simulation drives: a car, a pedestrian, and the
    /// traffic light, at their starting positions.
    pub fn crossing() -> Self {
        let mut scene = Self::new();
        scene.insert("car_1", Entity::prop(Vec3::new(-14.53, 0.5, -0.11)));
        scene.insert("pedestrian", Entity::prop(Vec3::new(-0.70, 0.9, -7.22)));
        scene.insert(
            TRAFFIC_LIGHT,
            Entity::lamp(Vec3::new(2.0, 3.0, 2.0), LightColor::Red),
        );
        scene
    }

    /// Add an entity, replacing any existing one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, entity: Entity) -> EntityId {
        let name = name.into();
        if let Some(&id) = self.names.get(&name) {
            self.entities[id.0] = entity;
            return id;
        }
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        self.names.insert(name, id);
        id
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.names.get(name).map(|id| &self.entities[id.0])
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.names
            .iter()
            .map(|(name, id)| (name.as_str(), &self.entities[id.0]))
    }
}

impl World for Scene {
    type Handle = EntityId;

    fn resolve(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    fn position(&self, entity: EntityId) -> Vec3 {
        self.entities[entity.0].position
    }

    fn set_position(&mut self, entity: EntityId, position: Vec3) {
        self.entities[entity.0].position = position;
    }

    fn set_color(&mut self, entity: EntityId, color: LightColor) -> bool {
        match &mut self.entities[entity.0].color {
            Some(current) => {
                *current = color;
                true
            }
            None => false,
        }
    }
}

// Crossing simulation: the producer side of the crosswalk pipeline.
//
// Models a single pedestrian crossing with a traffic light, one car, and
// one pedestrian, and turns every simulation step into newline-delimited
// JSON messages for the ingest server. The model itself (`CrossModel`) is
// pure and deterministic; the `simulate` binary wraps it with pacing and a
// `SimClient` connection.
//
// Module overview:
// - `params.rs`: `SimParams`, defaults and JSON loading.
// - `light.rs`:  `TrafficLight` phase machine.
// - `agents.rs`: `Car` and `Pedestrian`, with their action vocabularies.
// - `model.rs`:  `CrossModel`, which steps everything and emits messages.
//
// See also: `crosswalk_ingest` for the consumer side and `SimClient`,
// `crosswalk_protocol` for the message format.

pub mod agents;
pub mod light;
pub mod model;
pub mod params;

pub use agents::{CAR_ID, Car, CarAction, PEDESTRIAN_ID, Pedestrian, PedestrianAction};
pub use light::TrafficLight;
pub use model::CrossModel;
pub use params::{ParamsError, SimParams};

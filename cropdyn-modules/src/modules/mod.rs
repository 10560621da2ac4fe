mod ball_berry;
mod leaf_temperature;
mod light;
pub mod multilayer_canopy;
mod senescence;
mod thermal_time;

pub use ball_berry::{saturation_vapor_pressure, BallBerry, BallBerryInputs};
pub use leaf_temperature::{PenmanMonteithLeafTemperature, PenmanMonteithLeafTemperatureInputs};
pub use light::{LightMacroEnvironment, LightPartition, SEA_LEVEL_PRESSURE};
pub use multilayer_canopy::{
    MultilayerCanopy, RectangularHyperbolaLeaf, SunlitShadedLight, TEN_LAYERS,
};
pub use senescence::SenescenceCoefficientLogistic;
pub use thermal_time::ThermalTimeLinear;

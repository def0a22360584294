pub mod ids;
pub mod params;
pub mod plan;
pub mod run;

pub use ids::RunId;
pub use params::*;
pub use plan::*;
pub use run::*;

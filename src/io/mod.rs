//! Model I/O
//!
//! Trained networks are written as a parameter table plus values in JSON,
//! YAML or SafeTensors. The format follows the file extension.

mod format;
mod load;
mod model;
mod save;

pub use format::{ModelFormat, SaveConfig};
pub use load::load_model;
pub use model::{ModelMetadata, ModelState, ParameterInfo, SavedModel, SavedParameter};
pub use save::save_model;

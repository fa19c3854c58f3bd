#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod animator;
pub mod carousel;
pub mod error;
pub mod io;
pub mod loader;
pub mod model;
pub mod navigation;
pub mod nodes;
pub mod options;
pub mod scheduler;
pub mod surface;
pub mod texture;
pub mod viewport;

pub use carousel::*;
pub use error::*;
pub use model::*;
pub use options::*;

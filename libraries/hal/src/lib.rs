mod sensor;

pub use sensor::*;

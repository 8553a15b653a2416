pub mod cli;
pub mod codec;
pub mod dataset;
pub mod index;
pub mod layout;
pub mod naming;
pub mod renderer;
pub mod scan;
pub mod select;
pub mod sync;

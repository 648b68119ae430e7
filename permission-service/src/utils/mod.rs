pub mod duration;

pub use duration::humanize_duration;

pub mod capture;
pub mod dict;
pub mod normalize;
pub mod ranker;
pub mod service;
pub mod settings;

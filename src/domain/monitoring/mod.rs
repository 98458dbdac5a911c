pub mod expressions;
pub mod model;
pub mod service;

pub mod core;
pub mod pattern;
pub mod store;

// Resolution and rule management on top of the store
pub mod resolver;
pub mod rules;
pub mod sanitize;

// Decision making for concrete tool invocations
pub mod evaluator;

// Facade exposing the engine operations
pub mod engine;

// Optional components
pub mod logging;

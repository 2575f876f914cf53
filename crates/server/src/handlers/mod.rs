/// Operator draw management routes.
pub(crate) mod draws;

/// Public result page routes.
pub(crate) mod public;

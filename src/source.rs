pub(crate) mod factory;
pub(crate) mod media;
pub(crate) mod topology;

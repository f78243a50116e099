pub(crate) mod accumulator;
pub(crate) mod fields;

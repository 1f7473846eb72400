//! ocistow CLI - copy an OCI image between registries and sign it.

pub mod commands;

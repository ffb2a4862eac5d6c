//! Cross-crate tests that drive the engines the way the CLI does.

#[cfg(test)]
mod discovery;
#[cfg(test)]
mod ports;

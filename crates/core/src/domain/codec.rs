//! Codec boundary for personal-data fields.
//!
//! The production system encrypts personal fields at rest. That concern is an
//! external collaborator: handlers encode on write and decode after retrieval
//! through this trait, and the concrete cipher is supplied at wiring time.

/// Encodes and decodes field values at the stored/in-memory boundary.
pub trait FieldCodec: Send + Sync {
    /// Converts an in-memory value to its stored representation.
    fn encode(&self, plaintext: &str) -> String;

    /// Converts a stored representation back to the in-memory value.
    fn decode(&self, stored: &str) -> String;
}

/// Identity codec used when no field protection is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl FieldCodec for PassthroughCodec {
    fn encode(&self, plaintext: &str) -> String {
        plaintext.to_string()
    }

    fn decode(&self, stored: &str) -> String {
        stored.to_string()
    }
}

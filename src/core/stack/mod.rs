//! Declarative stack definition: manifest schema, grant derivation, and
//! one-shot assembly into an immutable deployment description.

pub mod assembly;
pub mod grants;
pub mod manifest;

pub use assembly::{assemble, assemble_from_file, DeploymentOutputs, Stack};
pub use grants::{Action, Grant, GrantSet, Principal};
pub use manifest::{BucketRole, CompletionMode, StackManifest};

use sha2::{Digest, Sha256};

/// SHA-256 of the given bytes encoded as lowercase hex.
pub fn compute_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

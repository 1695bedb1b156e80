use std::fmt;
use std::str::FromStr;

use tracing::debug;

use siloxane_core::{Bytes48, ParseBytesError};

/// A 48-byte polynomial commitment to a blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KzgCommitment(pub Bytes48);

/// A 48-byte proof that a blob matches a commitment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KzgProof(pub Bytes48);

macro_rules! hex_newtype {
    ($name:ident) => {
        impl $name {
            pub fn as_bytes(&self) -> &[u8; 48] {
                self.0.as_bytes()
            }
        }

        impl From<[u8; 48]> for $name {
            fn from(bytes: [u8; 48]) -> Self {
                $name(Bytes48::new(bytes))
            }
        }

        impl FromStr for $name {
            type Err = ParseBytesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(s.parse()?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

hex_newtype!(KzgCommitment);
hex_newtype!(KzgProof);

/// An external KZG implementation.
pub trait KzgBackend {
    type Error: std::error::Error;

    fn compute_blob_kzg_proof(
        &self,
        blob: &[u8],
        commitment: &KzgCommitment,
    ) -> Result<KzgProof, Self::Error>;

    fn verify_blob_kzg_proof(
        &self,
        blob: &[u8],
        commitment: &KzgCommitment,
        proof: &KzgProof,
    ) -> Result<bool, Self::Error>;
}

/// Computes a blob proof, returning `None` if the backend rejects the input.
///
/// A failure never turns into a default proof.
pub fn compute_blob_proof<B: KzgBackend>(
    backend: &B,
    blob: &[u8],
    commitment: &KzgCommitment,
) -> Option<KzgProof> {
    match backend.compute_blob_kzg_proof(blob, commitment) {
        Ok(proof) => Some(proof),
        Err(err) => {
            debug!(
                %commitment,
                blob_len = blob.len(),
                error = %err,
                "blob proof computation failed"
            );
            None
        }
    }
}

/// Verifies a blob proof, treating a backend failure as a rejected proof.
pub fn verify_blob_proof<B: KzgBackend>(
    backend: &B,
    blob: &[u8],
    commitment: &KzgCommitment,
    proof: &KzgProof,
) -> bool {
    match backend.verify_blob_kzg_proof(blob, commitment, proof) {
        Ok(valid) => valid,
        Err(err) => {
            debug!(%commitment, %proof, error = %err, "blob proof verification failed");
            false
        }
    }
}

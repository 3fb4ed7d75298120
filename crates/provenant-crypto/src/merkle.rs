//! # Merkle Proof Verification
//!
//! Inclusion and consistency proofs in the Certificate Transparency style:
//! leaves hash as `H(0x00 || preimage)` and interior nodes as
//! `H(0x01 || left || right)`, which makes a leaf and an interior node
//! with identical bytes hash differently and closes the second-preimage
//! construction over concatenated children.
//!
//! ```text
//!                 root = H(0x01 || a || b)
//!                /                        \
//!     a = H(0x01 || l0 || l1)       b = H(0x00 || p2)     (size 3)
//!        /             \
//!  l0 = H(0x00||p0)  l1 = H(0x00||p1)
//! ```
//!
//! Verification walks from the leaf upward, consuming one sibling per
//! level and skipping the levels where the ragged right edge of a
//! non-power-of-two tree has no sibling. Both proof shapes are bounded by
//! the claimed tree size: too many or too few siblings is a malformed
//! proof, never a loop.
//!
//! The [`LogTree`] builder exists for the other side of the protocol:
//! producing roots and proofs in tests and authoring collaborators.
//!
//! ## References
//!
//! - RFC 6962, Certificate Transparency, section 2.1.
//! - RFC 9162, Certificate Transparency 2.0, sections 2.1.3.2 / 2.1.4.2
//!   (the verification algorithms implemented here).

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Digest width of the tree hash.
pub const DIGEST_LEN: usize = 32;

/// A fixed-width tree digest.
pub type TreeDigest = [u8; DIGEST_LEN];

/// Malformed or out-of-range proof shapes.
///
/// A *mismatching* root is not an error here; [`root_from_inclusion`]
/// returns the computed root and the caller compares.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("tree is empty")]
    EmptyTree,

    #[error("leaf index {index} outside tree of size {tree_size}")]
    IndexOutOfRange { index: u64, tree_size: u64 },

    #[error("proof has more siblings than the tree has levels")]
    ProofTooLong,

    #[error("proof ended before reaching the root")]
    ProofTooShort,

    #[error("old tree size {old} exceeds new tree size {new}")]
    SizeRegression { old: u64, new: u64 },

    #[error("consistency proof is empty")]
    EmptyConsistencyProof,

    #[error("old root does not match the proof")]
    OldRootMismatch,
}

/// Leaf hash: `H(0x00 || preimage)`.
pub fn leaf_hash(preimage: &[u8]) -> TreeDigest {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(preimage);
    hasher.finalize().into()
}

/// Interior node hash: `H(0x01 || left || right)`.
pub fn node_hash(left: &TreeDigest, right: &TreeDigest) -> TreeDigest {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Recomputes the root implied by an inclusion proof.
///
/// `leaf` is the already-tagged leaf hash, `index` its position from zero,
/// `tree_size` the claimed leaf count and `proof` the sibling digests from
/// the leaf upward.
///
/// # Errors
///
/// Shape errors only; compare the returned root against the claimed one to
/// decide inclusion.
pub fn root_from_inclusion(
    leaf: TreeDigest,
    index: u64,
    tree_size: u64,
    proof: &[TreeDigest],
) -> Result<TreeDigest, ProofError> {
    if tree_size == 0 {
        return Err(ProofError::EmptyTree);
    }
    if index >= tree_size {
        return Err(ProofError::IndexOutOfRange { index, tree_size });
    }

    let mut fnode = index;
    let mut snode = tree_size - 1;
    let mut hash = leaf;

    for sibling in proof {
        if snode == 0 {
            return Err(ProofError::ProofTooLong);
        }
        if fnode & 1 == 1 || fnode == snode {
            hash = node_hash(sibling, &hash);
            if fnode & 1 == 0 {
                // Right-border node: climb past the levels that have no
                // sibling before consuming the next proof element.
                loop {
                    fnode >>= 1;
                    snode >>= 1;
                    if fnode & 1 == 1 || fnode == 0 {
                        break;
                    }
                }
            }
        } else {
            hash = node_hash(&hash, sibling);
        }
        fnode >>= 1;
        snode >>= 1;
    }

    if snode != 0 {
        return Err(ProofError::ProofTooShort);
    }
    Ok(hash)
}

/// Verifies that an inclusion proof binds `leaf` at `index` to `root`.
pub fn verify_inclusion(
    leaf: TreeDigest,
    index: u64,
    tree_size: u64,
    proof: &[TreeDigest],
    root: &TreeDigest,
) -> Result<bool, ProofError> {
    Ok(root_from_inclusion(leaf, index, tree_size, proof)? == *root)
}

/// Verifies that the tree of size `old_size` with root `old_root` is a
/// prefix of the tree of size `new_size` with root `new_root`.
///
/// # Errors
///
/// Shape errors, [`ProofError::OldRootMismatch`] when the proof resolves
/// to a different old root. A successful return of `false` means the proof
/// is well-formed but resolves to a different *new* root.
pub fn verify_consistency(
    old_size: u64,
    old_root: &TreeDigest,
    new_size: u64,
    new_root: &TreeDigest,
    proof: &[TreeDigest],
) -> Result<bool, ProofError> {
    if old_size > new_size {
        return Err(ProofError::SizeRegression { old: old_size, new: new_size });
    }
    if old_size == new_size {
        if !proof.is_empty() {
            return Err(ProofError::ProofTooLong);
        }
        return Ok(old_root == new_root);
    }
    if old_size == 0 {
        // Every tree extends the empty tree.
        if !proof.is_empty() {
            return Err(ProofError::ProofTooLong);
        }
        return Ok(true);
    }
    if proof.is_empty() {
        return Err(ProofError::EmptyConsistencyProof);
    }

    // When the old size is a power of two, the old root itself is the
    // first node on the path and is not repeated inside the proof.
    let (mut old_hash, mut new_hash, rest) = if old_size.is_power_of_two() {
        (*old_root, *old_root, proof)
    } else {
        (proof[0], proof[0], &proof[1..])
    };

    let mut fnode = old_size - 1;
    let mut snode = new_size - 1;
    while fnode & 1 == 1 {
        fnode >>= 1;
        snode >>= 1;
    }

    for sibling in rest {
        if snode == 0 {
            return Err(ProofError::ProofTooLong);
        }
        if fnode & 1 == 1 || fnode == snode {
            old_hash = node_hash(sibling, &old_hash);
            new_hash = node_hash(sibling, &new_hash);
            if fnode & 1 == 0 {
                loop {
                    fnode >>= 1;
                    snode >>= 1;
                    if fnode & 1 == 1 || fnode == 0 {
                        break;
                    }
                }
            }
        } else {
            new_hash = node_hash(&new_hash, sibling);
        }
        fnode >>= 1;
        snode >>= 1;
    }

    if snode != 0 {
        return Err(ProofError::ProofTooShort);
    }
    if old_hash != *old_root {
        return Err(ProofError::OldRootMismatch);
    }
    Ok(new_hash == *new_root)
}

/// Splits concatenated fixed-width digests into a sibling sequence.
///
/// Returns `None` when the byte length is not a whole number of digests.
pub fn split_digests(bytes: &[u8]) -> Option<Vec<TreeDigest>> {
    if bytes.len() % DIGEST_LEN != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(DIGEST_LEN)
            .map(|chunk| {
                let mut digest = [0u8; DIGEST_LEN];
                digest.copy_from_slice(chunk);
                digest
            })
            .collect(),
    )
}

/// An append-only hash tree over leaf preimages.
///
/// The verifier never needs one of these; it exists to *produce* roots and
/// proofs for tests and for authoring-side collaborators.
///
/// # Example
///
/// ```rust
/// use provenant_crypto::merkle::{leaf_hash, verify_inclusion, LogTree};
///
/// let mut tree = LogTree::new();
/// for entry in [b"a".as_slice(), b"b", b"c"] {
///     tree.push_preimage(entry);
/// }
///
/// let root = tree.root();
/// let proof = tree.inclusion_proof(1).unwrap();
/// assert!(verify_inclusion(leaf_hash(b"b"), 1, tree.size(), &proof, &root).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogTree {
    leaves: Vec<TreeDigest>,
}

impl LogTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from an iterator of leaf preimages.
    pub fn from_preimages<I, T>(preimages: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self {
            leaves: preimages
                .into_iter()
                .map(|p| leaf_hash(p.as_ref()))
                .collect(),
        }
    }

    /// Appends a leaf.
    pub fn push_preimage(&mut self, preimage: &[u8]) {
        self.leaves.push(leaf_hash(preimage));
    }

    pub fn size(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Root of the current tree. The empty tree hashes to `H("")`.
    pub fn root(&self) -> TreeDigest {
        if self.leaves.is_empty() {
            return Sha256::digest([]).into();
        }
        self.subtree_root(0, self.leaves.len())
    }

    /// Sibling path for the leaf at `index`.
    pub fn inclusion_proof(&self, index: u64) -> Option<Vec<TreeDigest>> {
        if index >= self.size() {
            return None;
        }
        let mut proof = Vec::new();
        self.collect_path(index as usize, 0, self.leaves.len(), &mut proof);
        Some(proof)
    }

    /// Consistency proof from `old_size` to the current size.
    pub fn consistency_proof(&self, old_size: u64) -> Option<Vec<TreeDigest>> {
        if old_size == 0 || old_size > self.size() {
            return None;
        }
        let mut proof = Vec::new();
        self.collect_consistency(old_size as usize, 0, self.leaves.len(), true, &mut proof);
        Some(proof)
    }

    fn subtree_root(&self, lo: usize, hi: usize) -> TreeDigest {
        let n = hi - lo;
        if n == 1 {
            return self.leaves[lo];
        }
        let k = largest_power_of_two_below(n);
        node_hash(
            &self.subtree_root(lo, lo + k),
            &self.subtree_root(lo + k, hi),
        )
    }

    fn collect_path(&self, m: usize, lo: usize, hi: usize, proof: &mut Vec<TreeDigest>) {
        let n = hi - lo;
        if n == 1 {
            return;
        }
        let k = largest_power_of_two_below(n);
        if m < k {
            self.collect_path(m, lo, lo + k, proof);
            proof.push(self.subtree_root(lo + k, hi));
        } else {
            self.collect_path(m - k, lo + k, hi, proof);
            proof.push(self.subtree_root(lo, lo + k));
        }
    }

    fn collect_consistency(
        &self,
        m: usize,
        lo: usize,
        hi: usize,
        whole: bool,
        proof: &mut Vec<TreeDigest>,
    ) {
        let n = hi - lo;
        if m == n {
            if !whole {
                proof.push(self.subtree_root(lo, hi));
            }
            return;
        }
        let k = largest_power_of_two_below(n);
        if m <= k {
            self.collect_consistency(m, lo, lo + k, whole, proof);
            proof.push(self.subtree_root(lo + k, hi));
        } else {
            self.collect_consistency(m - k, lo + k, hi, false, proof);
            proof.push(self.subtree_root(lo, lo + k));
        }
    }
}

fn largest_power_of_two_below(n: usize) -> usize {
    debug_assert!(n > 1);
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

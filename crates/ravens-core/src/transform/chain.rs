//! Ordered transform chains.
//!
//! A chain is an ordered sequence of transforms, each with an
//! "apply inverted" flag, mapping between two declared coordinate-space
//! endpoints. Order is outermost-to-innermost and must be respected
//! exactly, since linear and dense transforms do not commute.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::error::{CoreError, Result};
use crate::space::CoordinateSpace;
use crate::transform::element::{Transform, TransformKind};

/// One chain position: a transform plus its inversion flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainElement {
    pub transform: Transform,
    pub invert: bool,
}

impl ChainElement {
    pub fn forward(transform: Transform) -> Self {
        Self {
            transform,
            invert: false,
        }
    }

    pub fn inverted(transform: Transform) -> Self {
        Self {
            transform,
            invert: true,
        }
    }

    /// Source space after accounting for the inversion flag.
    pub fn effective_from(&self) -> CoordinateSpace {
        if self.invert {
            self.transform.to_space()
        } else {
            self.transform.from_space()
        }
    }

    /// Destination space after accounting for the inversion flag.
    pub fn effective_to(&self) -> CoordinateSpace {
        if self.invert {
            self.transform.from_space()
        } else {
            self.transform.to_space()
        }
    }
}

/// An ordered, validated sequence of transforms between two declared
/// coordinate-space endpoints.
///
/// Validation at construction guarantees two invariants:
/// every element's effective direction matches the declared endpoints,
/// and no element is flagged for inversion unless it is invertible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformChain {
    from: CoordinateSpace,
    to: CoordinateSpace,
    elements: Vec<ChainElement>,
}

impl TransformChain {
    /// Build and validate a chain.
    pub fn new(
        from: CoordinateSpace,
        to: CoordinateSpace,
        elements: Vec<ChainElement>,
    ) -> Result<Self> {
        if elements.is_empty() {
            return Err(CoreError::EmptyChain);
        }
        for (index, element) in elements.iter().enumerate() {
            if element.invert && !element.transform.is_invertible() {
                return Err(CoreError::NotInvertible(
                    element.transform.path().to_path_buf(),
                ));
            }
            if element.effective_from() != from || element.effective_to() != to {
                return Err(CoreError::DirectionMismatch {
                    index,
                    expected: format!("{from} -> {to}"),
                    found: format!("{} -> {}", element.effective_from(), element.effective_to()),
                });
            }
        }
        Ok(Self { from, to, elements })
    }

    /// A chain of exactly one element.
    pub fn single(element: ChainElement) -> Result<Self> {
        let from = element.effective_from();
        let to = element.effective_to();
        Self::new(from, to, vec![element])
    }

    pub fn from_space(&self) -> CoordinateSpace {
        self.from
    }

    pub fn to_space(&self) -> CoordinateSpace {
        self.to
    }

    pub fn elements(&self) -> &[ChainElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// True when the chain is a single linear transform and composition
    /// into a dense field would be a needless densification.
    pub fn is_single_linear(&self) -> bool {
        self.elements.len() == 1 && self.elements[0].transform.kind() == TransformKind::Linear
    }

    /// True when any element is a dense field.
    pub fn has_dense(&self) -> bool {
        self.elements
            .iter()
            .any(|e| e.transform.kind() == TransformKind::Dense)
    }

    /// Walk the chain in reverse with every inversion flag negated.
    ///
    /// The reversed chain maps between the same endpoints in the
    /// opposite direction; fails if any element lacks an inverse.
    pub fn reversed(&self) -> Result<Self> {
        let elements = self
            .elements
            .iter()
            .rev()
            .map(|e| ChainElement {
                transform: e.transform.clone(),
                invert: !e.invert,
            })
            .collect();
        Self::new(self.to, self.from, elements)
    }

    /// Every artifact path the chain references, inverse fields included.
    ///
    /// Used as the output set of the registration stage for cache checks.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for element in &self.elements {
            paths.push(element.transform.path().to_path_buf());
            if let Some(inv) = element.transform.inverse_path() {
                paths.push(inv.to_path_buf());
            }
        }
        paths
    }

    /// Deterministic one-line description of the chain, used in stage
    /// cache stamps so a changed chain specification invalidates the
    /// composed output.
    pub fn describe(&self) -> String {
        let mut out = format!("{}->{}", self.from, self.to);
        for element in &self.elements {
            let kind = match element.transform.kind() {
                TransformKind::Linear => "linear",
                TransformKind::Dense => "dense",
            };
            let _ = write!(
                out,
                ";{}:{}:{}",
                kind,
                element.transform.path().display(),
                if element.invert { "inv" } else { "fwd" }
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::CoordinateSpace::{Subject, Template};

    fn forward_pair() -> Vec<ChainElement> {
        vec![
            ChainElement::forward(Transform::dense_with_inverse(
                "warp.nii.gz",
                "inverse_warp.nii.gz",
                Subject,
                Template,
            )),
            ChainElement::forward(Transform::linear("affine.mat", Subject, Template)),
        ]
    }

    #[test]
    fn test_valid_forward_chain() {
        let chain = TransformChain::new(Subject, Template, forward_pair()).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain.has_dense());
        assert!(!chain.is_single_linear());
    }

    #[test]
    fn test_direction_mismatch_rejected() {
        let elements = vec![ChainElement::inverted(Transform::linear(
            "affine.mat",
            Subject,
            Template,
        ))];
        let err = TransformChain::new(Subject, Template, elements).unwrap_err();
        assert!(matches!(err, CoreError::DirectionMismatch { index: 0, .. }));
    }

    #[test]
    fn test_uninvertible_dense_rejected() {
        let elements = vec![ChainElement::inverted(Transform::dense(
            "warp.nii.gz",
            Subject,
            Template,
        ))];
        let err = TransformChain::new(Template, Subject, elements).unwrap_err();
        assert!(matches!(err, CoreError::NotInvertible(_)));
    }

    #[test]
    fn test_empty_chain_rejected() {
        let err = TransformChain::new(Subject, Template, Vec::new()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyChain));
    }

    #[test]
    fn test_reversed_swaps_endpoints_and_flags() {
        let chain = TransformChain::new(Subject, Template, forward_pair()).unwrap();
        let reversed = chain.reversed().unwrap();

        assert_eq!(reversed.from_space(), Template);
        assert_eq!(reversed.to_space(), Subject);
        assert_eq!(reversed.len(), 2);
        // Reversal flips order: the affine comes first, inverted.
        assert!(reversed.elements()[0].invert);
        assert_eq!(
            reversed.elements()[0].transform.kind(),
            TransformKind::Linear
        );
        assert!(reversed.elements()[1].invert);

        // Reversing twice restores the original chain.
        assert_eq!(reversed.reversed().unwrap(), chain);
    }

    #[test]
    fn test_reversed_fails_without_inverse_field() {
        let elements = vec![
            ChainElement::forward(Transform::dense("warp.nii.gz", Subject, Template)),
            ChainElement::forward(Transform::linear("affine.mat", Subject, Template)),
        ];
        let chain = TransformChain::new(Subject, Template, elements).unwrap();
        assert!(matches!(
            chain.reversed(),
            Err(CoreError::NotInvertible(_))
        ));
    }

    #[test]
    fn test_artifact_paths_include_inverse_fields() {
        let chain = TransformChain::new(Subject, Template, forward_pair()).unwrap();
        let paths = chain.artifact_paths();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().any(|p| p.ends_with("inverse_warp.nii.gz")));
    }

    #[test]
    fn test_describe_is_order_sensitive() {
        let chain = TransformChain::new(Subject, Template, forward_pair()).unwrap();
        let description = chain.describe();
        let warp = description.find("warp.nii.gz").unwrap();
        let affine = description.find("affine.mat").unwrap();
        assert!(warp < affine);
    }
}

use proptest::prelude::*;
use ravens_core::{ChainElement, CoordinateSpace, Transform, TransformChain};

use CoordinateSpace::{Subject, Template};

/// One invertible chain element whose effective direction is
/// subject -> template.
fn arb_element() -> impl Strategy<Value = ChainElement> {
    (0u32..1000, any::<bool>(), any::<bool>()).prop_map(|(id, dense, invert)| {
        // The declared direction is chosen so that, after the inversion
        // flag is accounted for, every element maps subject -> template.
        let (from, to) = if invert {
            (Template, Subject)
        } else {
            (Subject, Template)
        };
        let transform = if dense {
            Transform::dense_with_inverse(
                format!("warp_{id}.nii.gz"),
                format!("inverse_warp_{id}.nii.gz"),
                from,
                to,
            )
        } else {
            Transform::linear(format!("affine_{id}.mat"), from, to)
        };
        ChainElement { transform, invert }
    })
}

proptest! {
    #[test]
    fn reversal_swaps_endpoints(elements in prop::collection::vec(arb_element(), 1..6)) {
        let chain = TransformChain::new(Subject, Template, elements).unwrap();
        let reversed = chain.reversed().unwrap();
        prop_assert_eq!(reversed.from_space(), chain.to_space());
        prop_assert_eq!(reversed.to_space(), chain.from_space());
        prop_assert_eq!(reversed.len(), chain.len());
    }

    #[test]
    fn reversal_is_an_involution(elements in prop::collection::vec(arb_element(), 1..6)) {
        let chain = TransformChain::new(Subject, Template, elements).unwrap();
        let round_trip = chain.reversed().unwrap().reversed().unwrap();
        prop_assert_eq!(round_trip, chain);
    }

    #[test]
    fn reversal_negates_every_flag(elements in prop::collection::vec(arb_element(), 1..6)) {
        let chain = TransformChain::new(Subject, Template, elements).unwrap();
        let reversed = chain.reversed().unwrap();
        for (fwd, rev) in chain.elements().iter().zip(reversed.elements().iter().rev()) {
            prop_assert_eq!(fwd.invert, !rev.invert);
            prop_assert_eq!(&fwd.transform, &rev.transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::artifact::{
        BundleError, CompiledBundleSet, CompiledUnit, GeneratedUnit, InnerUnitClassifier,
        PrefixClassifier, UnitId, UnitOrigin,
    };

    fn hello_set() -> CompiledBundleSet {
        let mut set = CompiledBundleSet::new();
        set.insert_bundle(GeneratedUnit::generated("HelloLexer", "(lexer)"), vec![1, 2])
            .unwrap();
        set.add_inner("HelloLexer", "HelloLexer$NAME", vec![3]).unwrap();
        set.insert_bundle(GeneratedUnit::generated("HelloParser", "(parser)"), vec![4])
            .unwrap();
        set.add_inner("HelloParser", "HelloParser$greeting", vec![5, 6, 7])
            .unwrap();
        set
    }

    // ============================================================================
    // Classification
    // ============================================================================

    #[test]
    fn test_prefix_classifier_with_separator() {
        let classifier = PrefixClassifier::new();
        assert!(classifier.is_inner("HelloParser", "HelloParser$expr"));
        assert!(!classifier.is_inner("HelloParser", "HelloParser"));
        assert!(!classifier.is_inner("HelloParser", "HelloParserExtra"));
        assert!(!classifier.is_inner("HelloParser", "HelloParser$"));
        assert!(!classifier.is_inner("HelloParser", "HelloLexer$NAME"));
    }

    #[test]
    fn test_bare_prefix_classifier() {
        let classifier = PrefixClassifier::bare();
        assert!(classifier.is_inner("Hello", "HelloParser"));
        assert!(classifier.is_inner("HelloParser", "HelloParser$expr"));
        assert!(!classifier.is_inner("Hello", "Hello"));
    }

    #[test]
    fn test_custom_separator() {
        let classifier = PrefixClassifier::with_separator('#');
        assert!(classifier.is_inner("Calc", "Calc#expr"));
        assert!(!classifier.is_inner("Calc", "Calc$expr"));
        assert_eq!(classifier.separator(), Some('#'));
    }

    // ============================================================================
    // Bundle set
    // ============================================================================

    #[test]
    fn test_bundle_membership() {
        let set = hello_set();
        assert_eq!(set.len(), 2);
        assert_eq!(set.unit_count(), 4);
        assert_eq!(set.total_size(), 7);

        let parser = set.bundle("HelloParser").unwrap();
        assert_eq!(parser.inner_units().len(), 1);
        assert_eq!(parser.unit_ids().count(), 2);
        assert_eq!(parser.source().origin, UnitOrigin::Generated);

        let (id, unit) = set.unit_by_name("HelloLexer$NAME").unwrap();
        assert!(unit.is_inner());
        assert_eq!(set.bundle_of(id).unwrap().name(), "HelloLexer");
    }

    #[test]
    fn test_every_unit_in_exactly_one_bundle() {
        let set = hello_set();
        for index in 0..set.unit_count() {
            let id = UnitId(index as u32);
            let owners = set.bundles().filter(|bundle| bundle.contains(id)).count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    fn test_verify_classification() {
        let set = hello_set();
        assert!(set.verify_classification(&PrefixClassifier::new()).is_ok());
        match set.verify_classification(&PrefixClassifier::with_separator('#')) {
            Err(BundleError::Misclassified { unit, reason }) => {
                assert!(unit.contains('$'), "{}", unit);
                assert!(reason.starts_with("not an inner unit of"), "{}", reason);
            }
            other => panic!("expected misclassification, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_classification_prefers_longest_owner() {
        let mut set = CompiledBundleSet::new();
        set.insert_bundle(GeneratedUnit::utility("A", ""), vec![1]).unwrap();
        set.insert_bundle(GeneratedUnit::utility("A.b", ""), vec![2]).unwrap();
        set.add_inner("A", "A.b.c", vec![3]).unwrap();

        let classifier = PrefixClassifier::with_separator('.');
        match set.verify_classification(&classifier) {
            Err(BundleError::Misclassified { unit, reason }) => {
                assert_eq!(unit, "A.b.c");
                assert_eq!(reason, "belongs to A.b");
            }
            other => panic!("expected misclassification, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_bundle_rejected() {
        let mut set = hello_set();
        let result = set.insert_bundle(GeneratedUnit::utility("HelloLexer", ""), vec![]);
        assert_eq!(
            result,
            Err(BundleError::DuplicateBundle("HelloLexer".to_string()))
        );
    }

    #[test]
    fn test_duplicate_unit_name_rejected() {
        let mut set = hello_set();
        let result = set.add_inner("HelloParser", "HelloLexer$NAME", vec![]);
        assert!(matches!(result, Err(BundleError::DuplicateUnit(_))));
    }

    #[test]
    fn test_add_inner_to_unknown_bundle() {
        let mut set = CompiledBundleSet::new();
        let result = set.add_inner("Missing", "Missing$x", vec![]);
        assert!(matches!(result, Err(BundleError::UnknownBundle(_))));
    }

    #[test]
    fn test_simple_name_strips_package() {
        let unit = GeneratedUnit::generated("org.example.HelloParser", "");
        assert_eq!(unit.simple_name(), "HelloParser");
        let bare = GeneratedUnit::generated("HelloParser", "");
        assert_eq!(bare.simple_name(), "HelloParser");
    }

    // ============================================================================
    // Reassembly from parts
    // ============================================================================

    #[test]
    fn test_from_parts_roundtrip() {
        let set = hello_set();
        let bundles = set
            .bundles()
            .map(|b| (b.source().clone(), b.primary(), b.inner_units().to_vec()))
            .collect();
        let rebuilt = CompiledBundleSet::from_parts(set.units().to_vec(), bundles).unwrap();
        assert_eq!(rebuilt, set);
    }

    #[test]
    fn test_from_parts_rejects_orphan() {
        let units = vec![
            CompiledUnit::new("A", vec![], false),
            CompiledUnit::new("A$x", vec![], true),
        ];
        let bundles = vec![(GeneratedUnit::generated("A", ""), UnitId(0), vec![])];
        let result = CompiledBundleSet::from_parts(units, bundles);
        assert_eq!(result, Err(BundleError::OrphanUnit("A$x".to_string())));
    }

    #[test]
    fn test_from_parts_rejects_shared_unit() {
        let units = vec![
            CompiledUnit::new("A", vec![], false),
            CompiledUnit::new("B", vec![], false),
        ];
        let bundles = vec![
            (GeneratedUnit::generated("A", ""), UnitId(0), vec![]),
            (GeneratedUnit::generated("B", ""), UnitId(1), vec![UnitId(0)]),
        ];
        let result = CompiledBundleSet::from_parts(units, bundles);
        assert!(matches!(result, Err(BundleError::SharedUnit(_))));
    }

    #[test]
    fn test_from_parts_rejects_out_of_range_id() {
        let units = vec![CompiledUnit::new("A", vec![], false)];
        let bundles = vec![(GeneratedUnit::generated("A", ""), UnitId(0), vec![UnitId(9)])];
        let result = CompiledBundleSet::from_parts(units, bundles);
        assert_eq!(result, Err(BundleError::UnknownUnit(9)));
    }

    #[test]
    fn test_from_parts_rejects_inner_primary() {
        let units = vec![CompiledUnit::new("A", vec![], true)];
        let bundles = vec![(GeneratedUnit::generated("A", ""), UnitId(0), vec![])];
        let result = CompiledBundleSet::from_parts(units, bundles);
        assert!(matches!(result, Err(BundleError::Misclassified { .. })));
    }
}

#[cfg(test)]
mod tests {
    use crate::artifact::{CompiledBundleSet, GeneratedUnit};
    use crate::compiler::image::{self, LibraryHeader, UnitImage};
    use crate::loader::{LoadError, LoadedRecognizer, RecognizerRegistry};
    use crate::runtime::{run, CharStream, InvocationRequest};
    use crate::testing::{compile_grammar, HELLO};

    /// Same unit names as the Hello grammar, different language
    const IMPOSTOR: &str = r#"
grammar Hello;

greeting : NAME '!' ;

NAME : [0-9]+ ;
"#;

    fn library_payload(name: &str) -> Vec<u8> {
        image::encode(&UnitImage::Library(LibraryHeader {
            name: name.to_string(),
            fragments: Vec::new(),
            rules: Vec::new(),
        }))
        .unwrap()
    }

    #[test]
    fn test_load_registers_lexer_and_parser() {
        let set = compile_grammar("Hello", HELLO);
        let recognizer = LoadedRecognizer::load(&set).unwrap();

        assert_eq!(recognizer.lexer_names(), vec!["HelloLexer"]);
        assert_eq!(recognizer.parser_names(), vec!["HelloParser"]);
        assert_eq!(recognizer.unit_count(), set.unit_count());
        assert_eq!(recognizer.total_size(), set.total_size());
        assert_eq!(recognizer.registry().len(), 2);
    }

    #[test]
    fn test_unit_lookup_zero_copy() {
        let set = compile_grammar("Hello", HELLO);
        let recognizer = LoadedRecognizer::load(&set).unwrap();

        for unit in set.units() {
            assert_eq!(recognizer.unit(&unit.name), Some(unit.payload.as_slice()));
        }
        let entry = recognizer.entry("HelloParser$greeting").unwrap();
        assert!(entry.inner);
        assert_eq!(entry.bundle, "HelloParser");
        assert!(recognizer.unit("HelloParser$farewell").is_none());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let hello = LoadedRecognizer::load(&compile_grammar("Hello", HELLO)).unwrap();
        let impostor = LoadedRecognizer::load(&compile_grammar("Hello", IMPOSTOR)).unwrap();

        assert_ne!(hello.context_id(), impostor.context_id());
        assert_ne!(hello.unit("HelloParser$greeting"), impostor.unit("HelloParser$greeting"));

        let request = InvocationRequest::new();
        let first = run(&hello, CharStream::from_text("hello World;"), &request).unwrap();
        let second = run(&impostor, CharStream::from_text("42!"), &request).unwrap();
        assert!(first.is_success());
        assert!(second.is_success());

        // Each context only understands its own language
        let crossed = run(&impostor, CharStream::from_text("hello World;"), &request).unwrap();
        assert!(!crossed.is_success());
    }

    #[test]
    fn test_reload_is_indistinguishable() {
        let set = compile_grammar("Hello", HELLO);
        let first = LoadedRecognizer::load(&set).unwrap();
        let second = LoadedRecognizer::load(&set).unwrap();

        let request = InvocationRequest::new();
        let a = run(&first, CharStream::from_text("hello World;"), &request).unwrap();
        let b = run(&second, CharStream::from_text("hello World;"), &request).unwrap();
        assert_eq!(a.root, b.root);
        assert_eq!(a.tokens, b.tokens);
    }

    #[test]
    fn test_missing_rule_unit_is_unresolved() {
        let set = compile_grammar("Hello", HELLO);
        let bundle = set.bundle("HelloParser").unwrap();
        let primary = set.unit(bundle.primary()).unwrap().payload.clone();

        let mut broken = CompiledBundleSet::new();
        let lexer = set.bundle("HelloLexer").unwrap();
        let id = broken
            .insert_bundle(lexer.source().clone(), set.unit(lexer.primary()).unwrap().payload.clone())
            .unwrap();
        assert_eq!(id.index(), 0);
        for inner in lexer.inner_units() {
            let unit = set.unit(*inner).unwrap();
            broken.add_inner("HelloLexer", unit.name.clone(), unit.payload.clone()).unwrap();
        }
        // Parser header without its rule units
        broken.insert_bundle(bundle.source().clone(), primary).unwrap();

        let error = LoadedRecognizer::load(&broken).unwrap_err();
        assert_eq!(
            error,
            LoadError::Unresolved {
                unit: "HelloParser$greeting".to_string(),
                referenced_by: "HelloParser".to_string(),
            }
        );
    }

    #[test]
    fn test_corrupt_payload() {
        let mut set = CompiledBundleSet::new();
        set.insert_bundle(GeneratedUnit::generated("BrokenLexer", "(lexer)"), b"IGU\x01\xff\xff".to_vec())
            .unwrap();
        let error = LoadedRecognizer::load(&set).unwrap_err();
        assert!(matches!(error, LoadError::Corrupt { ref unit, .. } if unit == "BrokenLexer"));

        let mut set = CompiledBundleSet::new();
        set.insert_bundle(GeneratedUnit::generated("Plain", "text"), b"not an image".to_vec())
            .unwrap();
        assert!(matches!(
            LoadedRecognizer::load(&set),
            Err(LoadError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_library_only_bundle_loads_without_recognizers() {
        let mut set = CompiledBundleSet::new();
        set.insert_bundle(GeneratedUnit::utility("Support", "(library \"Support\")"), library_payload("Support"))
            .unwrap();
        let recognizer = LoadedRecognizer::load(&set).unwrap();
        assert!(recognizer.registry().is_empty());
        assert_eq!(recognizer.unit_count(), 1);
    }

    #[test]
    fn test_registry_separates_lexers_and_parsers() {
        let set = compile_grammar("Hello", HELLO);
        let recognizer = LoadedRecognizer::load(&set).unwrap();
        assert!(recognizer.registry().lexer("HelloParser").is_none());
        assert!(recognizer.registry().parser("HelloLexer").is_none());

        let registry = RecognizerRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.lexer_names().is_empty());
    }
}
